//! Shopping assistant conversation
//!
//! Each question is logged, sent to the product search and answered with a
//! logged reply. A failed search still produces a reply carrying the error,
//! so the log always alternates between prompt and answer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use log::{info, warn};

use crate::models::{AssistantMessage, GeoPoint, Product, UserId};
use crate::remote::ProductSearch;
use crate::remote::api::{ProductDto, ProductSearchRequest, ProductSearchResponse};
use crate::settings::{DEFAULT_DISTANCE_KM, Settings};
use crate::storage::ChatStore;

/// Where to look for products
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    /// Sent as (0, 0) when unknown
    pub center: Option<GeoPoint>,
    pub distance_km: u32,
}

impl Default for SearchArea {
    fn default() -> Self {
        Self {
            center: None,
            distance_km: DEFAULT_DISTANCE_KM,
        }
    }
}

impl SearchArea {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            center: settings.location(),
            distance_km: settings.distance_km,
        }
    }
}

/// Talks to the product search on behalf of the user and keeps the log
pub struct Assistant {
    search: Arc<dyn ProductSearch>,
    store: Arc<dyn ChatStore>,
    client_key: Option<String>,
    next_seq: AtomicU64,
}

impl Assistant {
    pub fn new(search: Arc<dyn ProductSearch>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            search,
            store,
            client_key: None,
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn with_client_key(mut self, key: Option<String>) -> Self {
        self.client_key = key;
        self
    }

    /// Ask for products matching `query` and return the logged reply
    ///
    /// Search failures become an error reply. Fails only on a blank query
    /// or when the log cannot be written.
    pub fn ask(&self, user: &UserId, query: &str, area: SearchArea) -> Result<AssistantMessage> {
        let query = query.trim();
        if query.is_empty() {
            bail!("Query must not be empty");
        }

        self.store
            .insert_assistant_message(AssistantMessage::prompt(self.next_id(), query))
            .context("Failed to log assistant prompt")?;

        let request = ProductSearchRequest {
            key: self.client_key.clone(),
            query: query.to_string(),
            client_id: user.as_str().to_string(),
            location: area.center.unwrap_or_default().into(),
            distance: area.distance_km,
        };

        let reply = match self.search.search_products(&request) {
            Ok(response) => self.reply_from(response),
            Err(e) => {
                warn!("Product search failed: {}", e);
                let text = e.to_string();
                AssistantMessage::reply(
                    self.next_id(),
                    text.clone(),
                    Vec::new(),
                    Some(text),
                    Vec::new(),
                )
            }
        };

        self.store
            .insert_assistant_message(reply.clone())
            .context("Failed to log assistant reply")?;
        Ok(reply)
    }

    /// The whole log, oldest first
    pub fn log(&self) -> Result<Vec<AssistantMessage>> {
        self.store.list_assistant_messages()
    }

    pub fn purge(&self) -> Result<usize> {
        let removed = self.store.delete_assistant_messages()?;
        info!("Purged {} assistant messages", removed);
        Ok(removed)
    }

    fn reply_from(&self, response: ProductSearchResponse) -> AssistantMessage {
        let products = into_products(response.products);
        let optional_products = into_products(response.optional_products);
        info!(
            "Assistant suggested {} product(s), {} alternative(s)",
            products.len(),
            optional_products.len()
        );
        AssistantMessage::reply(
            self.next_id(),
            response.first_message,
            products,
            response.second_message,
            optional_products,
        )
    }

    fn next_id(&self) -> String {
        format!(
            "assistant-{}-{}",
            Utc::now().timestamp_millis(),
            self.next_seq.fetch_add(1, Ordering::SeqCst)
        )
    }
}

fn into_products(dtos: Option<Vec<ProductDto>>) -> Vec<Product> {
    dtos.unwrap_or_default()
        .into_iter()
        .map(Product::from)
        .collect()
}
