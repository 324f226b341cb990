//! Remote backend integration
//!
//! This module provides:
//! - Traits for the managed backend (snapshot subscription, message writes,
//!   status updates) and the store-profile endpoint
//! - HTTP clients for the store-profile and product-search endpoints
//! - An in-memory backend for tests and offline use
//! - Wire DTOs and their mapping to domain models

mod client;
mod memory;

pub use client::{AssistantClient, HttpStoreFetcher};
pub use memory::InMemoryRemote;

use anyhow::Result;

use crate::models::{Message, MessageStatus, StoreId, StoreProfile, UserId};

/// Typed failure from the store-profile endpoint
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode store profile: {0}")]
    Decode(String),

    #[error("Store not found: {0}")]
    NotFound(String),
}

/// Fetches a single store profile by ID
pub trait StoreFetcher: Send + Sync {
    fn fetch_store(&self, id: &StoreId) -> Result<StoreProfile, FetchError>;
}

/// Asks the shopping assistant for products matching a free-text query
pub trait ProductSearch: Send + Sync {
    fn search_products(
        &self,
        request: &api::ProductSearchRequest,
    ) -> Result<api::ProductSearchResponse, FetchError>;
}

/// Composite key locating a remote message record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    pub client_id: UserId,
    pub store_id: StoreId,
    pub timestamp: i64,
}

impl MessageFilter {
    pub fn for_message(message: &Message) -> Self {
        Self {
            client_id: message.client_id.clone(),
            store_id: message.store_id.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Handle to a remote message record, as returned by a filtered lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// Backend document ID (not necessarily the message ID)
    pub document_id: String,
}

/// Write side of the managed backend
pub trait RemoteMessages: Send + Sync {
    /// Submit a newly created message
    fn add_message(&self, message: &Message) -> Result<()>;

    /// Find the single best record matching the filter (limit one)
    fn find_message(&self, filter: &MessageFilter) -> Result<Option<RemoteRecord>>;

    /// Overwrite the status field of a record
    fn update_status(&self, record: &RemoteRecord, status: MessageStatus) -> Result<()>;
}

/// Server-side filter for the inbound message subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub client_id: UserId,
    /// Only records with this status are delivered
    pub status: MessageStatus,
}

impl SnapshotQuery {
    /// Store messages addressed to `client_id` that the user hasn't seen
    pub fn inbound(client_id: UserId) -> Self {
        Self {
            client_id,
            status: MessageStatus::Sent,
        }
    }
}

/// Receives every snapshot (or delivery error) pushed by the backend
pub type SnapshotListener = Box<dyn Fn(Result<Vec<Message>>) + Send + Sync>;

/// Keeps a snapshot listener registered until removed or dropped
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A registration with nothing to undo
    pub fn noop() -> Self {
        Self { remove: None }
    }

    pub fn remove(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

/// Pushes full snapshots of matching records on every change
///
/// Each delivery is the complete, authoritative batch ordered by timestamp,
/// not a delta.
pub trait SnapshotSource: Send + Sync {
    fn listen(&self, query: SnapshotQuery, listener: SnapshotListener)
    -> Result<ListenerRegistration>;
}

/// Wire types exchanged with the backend
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::{
        ContactInfo, GeoPoint, Message, MessageId, MessageStatus, Origin, Product, StoreId,
        StoreProfile, UserId,
    };

    /// Message record as stored by the backend
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageDto {
        pub id: String,
        pub text: String,
        pub from_client: bool,
        pub client_id: String,
        pub store_id: String,
        pub date: i64,
        pub status: MessageStatus,
        #[serde(default)]
        pub product: Option<serde_json::Value>,
    }

    impl From<MessageDto> for Message {
        fn from(dto: MessageDto) -> Self {
            Message {
                id: MessageId::new(dto.id),
                text: dto.text,
                origin: if dto.from_client {
                    Origin::User
                } else {
                    Origin::Counterparty
                },
                client_id: UserId::new(dto.client_id),
                store_id: StoreId::new(dto.store_id),
                timestamp: dto.date,
                status: dto.status,
                product: dto.product.map(|p| p.to_string()),
            }
        }
    }

    impl From<&Message> for MessageDto {
        fn from(message: &Message) -> Self {
            MessageDto {
                id: message.id.0.clone(),
                text: message.text.clone(),
                from_client: message.origin == Origin::User,
                client_id: message.client_id.0.clone(),
                store_id: message.store_id.0.clone(),
                date: message.timestamp,
                status: message.status,
                product: message
                    .product
                    .as_deref()
                    .and_then(|p| serde_json::from_str(p).ok()),
            }
        }
    }

    /// GeoJSON point
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct GeoPointDto {
        #[serde(rename = "type", default)]
        pub kind: String,
        pub coordinates: Vec<f64>,
    }

    impl From<GeoPoint> for GeoPointDto {
        fn from(point: GeoPoint) -> Self {
            GeoPointDto {
                kind: "Point".to_string(),
                coordinates: point.to_geojson().to_vec(),
            }
        }
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct ImageDto {
        #[serde(default)]
        pub url: String,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct AddressDto {
        #[serde(default)]
        pub location: Option<GeoPointDto>,
    }

    /// Store document returned by the store-profile endpoint
    ///
    /// Only the fields the chat core uses are decoded; the rest are ignored.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StoreDto {
        pub id: String,
        pub name: String,
        #[serde(default)]
        pub image: ImageDto,
        #[serde(default)]
        pub address: AddressDto,
        #[serde(default)]
        pub phone_number: String,
        #[serde(default)]
        pub email_address: String,
        #[serde(default)]
        pub website: String,
        #[serde(default)]
        pub description: String,
    }

    impl From<StoreDto> for StoreProfile {
        fn from(dto: StoreDto) -> Self {
            StoreProfile {
                id: StoreId::new(dto.id),
                name: dto.name,
                image_url: dto.image.url,
                location: dto
                    .address
                    .location
                    .and_then(|p| GeoPoint::from_geojson(&p.coordinates)),
                contact: ContactInfo {
                    phone_number: dto.phone_number,
                    email_address: dto.email_address,
                    website: dto.website,
                },
                description: dto.description,
            }
        }
    }

    /// Body of `POST {base}/hermes`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductSearchRequest {
        /// Client API key, when one is configured
        #[serde(skip_serializing_if = "Option::is_none")]
        pub key: Option<String>,
        pub query: String,
        pub client_id: String,
        pub location: GeoPointDto,
        /// Search radius in kilometres
        pub distance: u32,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct PriceDto {
        #[serde(default)]
        pub amount: f64,
        #[serde(default)]
        pub currency: String,
    }

    /// Product document; only the fields the chat core shows are decoded
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductDto {
        pub id: String,
        pub name: String,
        #[serde(default)]
        pub price: PriceDto,
        #[serde(default)]
        pub image: ImageDto,
        #[serde(default)]
        pub store_id: Option<String>,
    }

    impl From<ProductDto> for Product {
        fn from(dto: ProductDto) -> Self {
            Product {
                id: dto.id,
                name: dto.name,
                price: (dto.price.amount * 100.0).round() as i64,
                currency: dto.price.currency,
                image_url: dto.image.url,
                store_id: StoreId::new(dto.store_id.unwrap_or_default()),
            }
        }
    }

    /// Assistant answer: a lead text with products, optionally followed by
    /// a second text with alternatives
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductSearchResponse {
        pub first_message: String,
        #[serde(default)]
        pub products: Option<Vec<ProductDto>>,
        #[serde(default)]
        pub second_message: Option<String>,
        #[serde(default)]
        pub optional_products: Option<Vec<ProductDto>>,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_search_request_json() {
            let request = ProductSearchRequest {
                key: None,
                query: "running shoes".to_string(),
                client_id: "u1".to_string(),
                location: GeoPoint::new(40.4, -3.7).into(),
                distance: 10,
            };

            let json = serde_json::to_value(&request).unwrap();
            assert_eq!(json["clientId"], "u1");
            assert_eq!(json["location"]["type"], "Point");
            assert_eq!(json["location"]["coordinates"][0], -3.7);
            assert_eq!(json["distance"], 10);
            assert!(json.get("key").is_none());
        }

        #[test]
        fn test_search_response_with_products() {
            let json = r#"{
                "firstMessage": "These should fit",
                "products": [{
                    "id": "p1",
                    "name": "Trail runner",
                    "model": "TR-2",
                    "price": {"amount": 89.99, "currency": "EUR"},
                    "image": {"url": "https://img.example/p1.png"},
                    "stock": 3,
                    "storeId": "s1"
                }],
                "secondMessage": null
            }"#;

            let response: ProductSearchResponse = serde_json::from_str(json).unwrap();
            let products: Vec<Product> = response
                .products
                .unwrap()
                .into_iter()
                .map(Product::from)
                .collect();
            assert_eq!(products[0].price, 8999);
            assert_eq!(products[0].store_id, StoreId::new("s1"));
            assert!(response.second_message.is_none());
            assert!(response.optional_products.is_none());
        }

        #[test]
        fn test_message_dto_from_store() {
            let json = r#"{
                "id": "m1",
                "text": "Your order is ready",
                "fromClient": false,
                "clientId": "u1",
                "storeId": "s1",
                "date": 1719400000000,
                "status": "delivered",
                "product": {"id": "p1", "price": 1200}
            }"#;

            let dto: MessageDto = serde_json::from_str(json).unwrap();
            let message = Message::from(dto);

            assert_eq!(message.origin, Origin::Counterparty);
            assert_eq!(message.status, MessageStatus::Delivered);
            assert_eq!(message.timestamp, 1719400000000);
            assert!(message.product.unwrap().contains("\"p1\""));
        }

        #[test]
        fn test_message_dto_from_user_message() {
            let message = Message::builder(MessageId::new("m2"), StoreId::new("s1"))
                .text("Do you ship?")
                .origin(Origin::User)
                .client_id(UserId::new("u1"))
                .timestamp(42)
                .build();

            let dto = MessageDto::from(&message);
            assert!(dto.from_client);
            assert_eq!(dto.date, 42);
            assert!(dto.product.is_none());

            let json = serde_json::to_value(&dto).unwrap();
            assert_eq!(json["status"], "sent");
            assert_eq!(json["storeId"], "s1");
        }

        #[test]
        fn test_store_dto_with_location() {
            let json = r#"{
                "id": "s1",
                "name": "Corner Coffee",
                "image": {"url": "https://img.example/s1.png"},
                "address": {
                    "street": "Main St 1",
                    "location": {"type": "Point", "coordinates": [-3.7, 40.4]}
                },
                "phoneNumber": "+34 600 000 000",
                "emailAddress": "hi@corner.example",
                "website": "https://corner.example",
                "description": "Specialty coffee",
                "brands": ["Acme"],
                "createdAt": 1
            }"#;

            let profile = StoreProfile::from(serde_json::from_str::<StoreDto>(json).unwrap());
            assert_eq!(profile.id, StoreId::new("s1"));
            assert_eq!(profile.image_url, "https://img.example/s1.png");
            assert_eq!(profile.location, Some(GeoPoint::new(40.4, -3.7)));
            assert_eq!(profile.contact.website, "https://corner.example");
        }

        #[test]
        fn test_store_dto_minimal() {
            let json = r#"{"id": "s2", "name": "Kiosk"}"#;
            let profile = StoreProfile::from(serde_json::from_str::<StoreDto>(json).unwrap());
            assert!(profile.location.is_none());
            assert!(profile.contact.phone_number.is_empty());
        }
    }
}
