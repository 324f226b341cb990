//! Conversation model: all messages exchanged with one store

use serde::{Deserialize, Serialize};

use super::{Message, StoreId};

/// A derived, never persisted thread of messages with a single store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// The store on the other side
    pub store_id: StoreId,
    /// Messages in chronological order
    pub messages: Vec<Message>,
    /// Counterparty messages still `sent` or `delivered`
    pub unread_count: usize,
}

impl Conversation {
    pub fn new(store_id: StoreId, messages: Vec<Message>) -> Self {
        let unread_count = messages.iter().filter(|m| m.is_unread()).count();
        Self {
            store_id,
            messages,
            unread_count,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_message().map(|m| m.timestamp)
    }
}
