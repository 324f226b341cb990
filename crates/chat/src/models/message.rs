//! Message model representing a single user/store chat message

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::StoreId;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the authenticated user (client) a message belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Delivery status of a message
///
/// Ordered: a status only ever moves forward (`Sent < Delivered < Read`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_advance_to(&self, next: MessageStatus) -> bool {
        next > *self
    }
}

/// Which side of the conversation wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written by the local user
    User,
    /// Written by the store on the other side
    Counterparty,
}

/// A single message in a user/store conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique message ID
    pub id: MessageId,
    /// Message body
    pub text: String,
    /// Who wrote the message
    pub origin: Origin,
    /// The user side of the conversation
    pub client_id: UserId,
    /// The store side of the conversation
    pub store_id: StoreId,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub status: MessageStatus,
    /// Serialized product attached to the message, kept opaque
    #[serde(default)]
    pub product: Option<String>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: MessageId, store_id: StoreId) -> MessageBuilder {
        MessageBuilder::new(id, store_id)
    }

    /// Whether the message came from the store side
    pub fn is_from_counterparty(&self) -> bool {
        self.origin == Origin::Counterparty
    }

    /// Counterparty message the user hasn't read yet
    pub fn is_unread(&self) -> bool {
        self.is_from_counterparty()
            && matches!(self.status, MessageStatus::Sent | MessageStatus::Delivered)
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    store_id: StoreId,
    text: String,
    origin: Origin,
    client_id: UserId,
    timestamp: Option<i64>,
    status: MessageStatus,
    product: Option<String>,
}

impl MessageBuilder {
    fn new(id: MessageId, store_id: StoreId) -> Self {
        Self {
            id,
            store_id,
            text: String::new(),
            origin: Origin::User,
            client_id: UserId::new(""),
            timestamp: None,
            status: MessageStatus::Sent,
            product: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn client_id(mut self, client_id: UserId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            text: self.text,
            origin: self.origin,
            client_id: self.client_id,
            store_id: self.store_id,
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
            status: self.status,
            product: self.product,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Read));
        assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.can_advance_to(MessageStatus::Delivered));
    }

    #[test]
    fn test_status_parse() {
        for status in [MessageStatus::Sent, MessageStatus::Delivered, MessageStatus::Read] {
            assert_eq!(MessageStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MessageStatus::parse("seen"), None);
    }

    #[test]
    fn test_unread_only_counts_counterparty_messages() {
        let from_store = Message::builder(MessageId::new("m1"), StoreId::new("s1"))
            .origin(Origin::Counterparty)
            .status(MessageStatus::Delivered)
            .build();
        let from_user = Message::builder(MessageId::new("m2"), StoreId::new("s1"))
            .origin(Origin::User)
            .status(MessageStatus::Sent)
            .build();
        let read = Message::builder(MessageId::new("m3"), StoreId::new("s1"))
            .origin(Origin::Counterparty)
            .status(MessageStatus::Read)
            .build();

        assert!(from_store.is_unread());
        assert!(!from_user.is_unread());
        assert!(!read.is_unread());
    }

    #[test]
    fn test_builder_defaults() {
        let msg = Message::builder(MessageId::new("m1"), StoreId::new("s1")).build();
        assert_eq!(msg.origin, Origin::User);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.timestamp > 0);
        assert!(msg.product.is_none());
    }
}
