//! Assistant log entries
//!
//! Messages exchanged with the shopping assistant live in their own log,
//! apart from store conversations. They are never synced and can only be
//! purged in bulk.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::Product;

/// One turn in the assistant conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    /// True for the user's prompt, false for the assistant's reply
    pub is_user: bool,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub first_text: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub second_text: Option<String>,
    #[serde(default)]
    pub optional_products: Vec<Product>,
}

impl AssistantMessage {
    /// A prompt typed by the user
    pub fn prompt(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_user: true,
            timestamp: Utc::now().timestamp_millis(),
            first_text: text.into(),
            products: Vec::new(),
            second_text: None,
            optional_products: Vec::new(),
        }
    }

    /// A reply from the assistant with the products it suggested
    pub fn reply(
        id: impl Into<String>,
        first_text: impl Into<String>,
        products: Vec<Product>,
        second_text: Option<String>,
        optional_products: Vec<Product>,
    ) -> Self {
        Self {
            id: id.into(),
            is_user: false,
            timestamp: Utc::now().timestamp_millis(),
            first_text: first_text.into(),
            products,
            second_text,
            optional_products,
        }
    }
}
