//! Domain models for chat entities

mod assistant;
mod conversation;
mod message;
mod product;
mod store;

pub use assistant::AssistantMessage;
pub use conversation::Conversation;
pub use message::{Message, MessageBuilder, MessageId, MessageStatus, Origin, UserId};
pub use product::{Cart, Product};
pub use store::{ContactInfo, GeoPoint, ProfileLookup, StoreId, StoreProfile};
