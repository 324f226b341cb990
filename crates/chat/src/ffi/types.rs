//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `MessageId`/`StoreId`/`UserId` → `String`
//! - `Origin` → `from_client` flag, as on the wire
//! - `usize` counters → `u32`
//! - `ProfileLookup` → `FfiProfileState`

use crate::actions::StatusOutcome;
use crate::models::{
    AssistantMessage, GeoPoint, Message, MessageId, MessageStatus, Origin, Product, ProfileLookup,
    StoreId, StoreProfile, UserId,
};
use crate::query::ConversationSummary;
use crate::sync::{MergeStats, ResolveSummary, RetryEntry, RetryKind, RetryReport, SendOutcome};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ChatError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl From<anyhow::Error> for ChatError {
    fn from(e: anyhow::Error) -> Self {
        let message = format!("{:#}", e);
        if e.downcast_ref::<rusqlite::Error>().is_some() {
            ChatError::Database { message }
        } else {
            ChatError::Backend { message }
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for ChatError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        ChatError::Backend { message: e.reason }
    }
}

// ============================================================================
// Message Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiMessageStatus {
    Sent,
    Delivered,
    Read,
}

impl From<MessageStatus> for FfiMessageStatus {
    fn from(s: MessageStatus) -> Self {
        match s {
            MessageStatus::Sent => FfiMessageStatus::Sent,
            MessageStatus::Delivered => FfiMessageStatus::Delivered,
            MessageStatus::Read => FfiMessageStatus::Read,
        }
    }
}

impl From<FfiMessageStatus> for MessageStatus {
    fn from(s: FfiMessageStatus) -> Self {
        match s {
            FfiMessageStatus::Sent => MessageStatus::Sent,
            FfiMessageStatus::Delivered => MessageStatus::Delivered,
            FfiMessageStatus::Read => MessageStatus::Read,
        }
    }
}

/// FFI-friendly message representation
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMessage {
    pub id: String,
    pub text: String,
    /// Written by the local user rather than the store
    pub from_client: bool,
    pub client_id: String,
    pub store_id: String,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub status: FfiMessageStatus,
    /// Attached product as JSON
    pub product: Option<String>,
}

impl From<Message> for FfiMessage {
    fn from(m: Message) -> Self {
        Self {
            id: m.id.0,
            text: m.text,
            from_client: m.origin == Origin::User,
            client_id: m.client_id.0,
            store_id: m.store_id.0,
            timestamp: m.timestamp,
            status: m.status.into(),
            product: m.product,
        }
    }
}

impl From<FfiMessage> for Message {
    fn from(m: FfiMessage) -> Self {
        Message {
            id: MessageId::new(m.id),
            text: m.text,
            origin: if m.from_client {
                Origin::User
            } else {
                Origin::Counterparty
            },
            client_id: UserId::new(m.client_id),
            store_id: StoreId::new(m.store_id),
            timestamp: m.timestamp,
            status: m.status.into(),
            product: m.product,
        }
    }
}

// ============================================================================
// Store Types
// ============================================================================

/// FFI-friendly store profile
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiStoreProfile {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone_number: String,
    pub email_address: String,
    pub website: String,
    pub description: String,
}

impl From<StoreProfile> for FfiStoreProfile {
    fn from(p: StoreProfile) -> Self {
        let location = p.location.unwrap_or_default();
        let has_location = p.location.is_some();
        Self {
            id: p.id.0,
            name: p.name,
            image_url: p.image_url,
            latitude: has_location.then_some(location.latitude),
            longitude: has_location.then_some(location.longitude),
            phone_number: p.contact.phone_number,
            email_address: p.contact.email_address,
            website: p.contact.website,
            description: p.description,
        }
    }
}

impl FfiStoreProfile {
    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }
}

/// What is known about a conversation's store
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiProfileState {
    Found { profile: FfiStoreProfile },
    NotYetResolved,
    Failed { reason: String },
}

impl From<ProfileLookup> for FfiProfileState {
    fn from(lookup: ProfileLookup) -> Self {
        match lookup {
            ProfileLookup::Found(profile) => FfiProfileState::Found {
                profile: profile.into(),
            },
            ProfileLookup::NotYetResolved => FfiProfileState::NotYetResolved,
            ProfileLookup::Failed(reason) => FfiProfileState::Failed { reason },
        }
    }
}

// ============================================================================
// Conversation Types
// ============================================================================

/// FFI-friendly conversation row for list views
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConversation {
    pub store_id: String,
    /// Store name, or the store ID until the profile resolves
    pub title: String,
    pub store: FfiProfileState,
    pub last_message: Option<FfiMessage>,
    pub message_count: u32,
    pub unread_count: u32,
}

impl From<ConversationSummary> for FfiConversation {
    fn from(s: ConversationSummary) -> Self {
        let title = s.title();
        let conversation = s.conversation;
        Self {
            store_id: conversation.store_id.0.clone(),
            title,
            store: s.store.into(),
            last_message: conversation.last_message().cloned().map(FfiMessage::from),
            message_count: conversation.messages.len() as u32,
            unread_count: conversation.unread_count as u32,
        }
    }
}

// ============================================================================
// Operation Results
// ============================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMergeStats {
    pub received: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl From<MergeStats> for FfiMergeStats {
    fn from(s: MergeStats) -> Self {
        Self {
            received: s.received as u32,
            inserted: s.inserted as u32,
            skipped: s.skipped as u32,
            errors: s.errors as u32,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResolveSummary {
    pub requested: u32,
    pub resolved: u32,
    pub failed: u32,
    pub cancelled: bool,
}

impl From<ResolveSummary> for FfiResolveSummary {
    fn from(s: ResolveSummary) -> Self {
        Self {
            requested: s.requested as u32,
            resolved: s.resolved as u32,
            failed: s.failed as u32,
            cancelled: s.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiStatusOutcome {
    Updated { status: FfiMessageStatus },
    AlreadyAtStatus,
    NoMatch,
    Failed { reason: String },
}

impl From<StatusOutcome> for FfiStatusOutcome {
    fn from(o: StatusOutcome) -> Self {
        match o {
            StatusOutcome::Updated(status) => FfiStatusOutcome::Updated {
                status: status.into(),
            },
            StatusOutcome::AlreadyAtStatus => FfiStatusOutcome::AlreadyAtStatus,
            StatusOutcome::NoMatch => FfiStatusOutcome::NoMatch,
            StatusOutcome::Failed(reason) => FfiStatusOutcome::Failed { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiSendOutcome {
    Submitted,
    Pending { reason: String },
}

impl From<SendOutcome> for FfiSendOutcome {
    fn from(o: SendOutcome) -> Self {
        match o {
            SendOutcome::Submitted => FfiSendOutcome::Submitted,
            SendOutcome::Pending(reason) => FfiSendOutcome::Pending { reason },
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRetryEntry {
    /// "send" or "read_receipt"
    pub kind: String,
    pub message_id: String,
    pub last_error: String,
}

impl From<RetryEntry> for FfiRetryEntry {
    fn from(e: RetryEntry) -> Self {
        let kind = match e.kind {
            RetryKind::Send => "send",
            RetryKind::ReadReceipt => "read_receipt",
        };
        Self {
            kind: kind.to_string(),
            message_id: e.message_id.0,
            last_error: e.last_error,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRetryReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub remaining: u32,
}

impl From<RetryReport> for FfiRetryReport {
    fn from(r: RetryReport) -> Self {
        Self {
            attempted: r.attempted as u32,
            succeeded: r.succeeded as u32,
            remaining: r.remaining as u32,
        }
    }
}

// ============================================================================
// Assistant and Cart Types
// ============================================================================

/// FFI-friendly product; `price` is in minor units
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiProduct {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub currency: String,
    pub image_url: String,
    pub store_id: String,
}

impl From<Product> for FfiProduct {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price,
            currency: p.currency,
            image_url: p.image_url,
            store_id: p.store_id.0,
        }
    }
}

impl From<FfiProduct> for Product {
    fn from(p: FfiProduct) -> Self {
        Product {
            id: p.id,
            name: p.name,
            price: p.price,
            currency: p.currency,
            image_url: p.image_url,
            store_id: StoreId::new(p.store_id),
        }
    }
}

/// One entry of the assistant log
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiAssistantMessage {
    pub id: String,
    pub is_user: bool,
    pub timestamp: i64,
    pub first_text: String,
    pub products: Vec<FfiProduct>,
    pub second_text: Option<String>,
    pub optional_products: Vec<FfiProduct>,
}

impl From<AssistantMessage> for FfiAssistantMessage {
    fn from(m: AssistantMessage) -> Self {
        Self {
            id: m.id,
            is_user: m.is_user,
            timestamp: m.timestamp,
            first_text: m.first_text,
            products: m.products.into_iter().map(FfiProduct::from).collect(),
            second_text: m.second_text,
            optional_products: m.optional_products.into_iter().map(FfiProduct::from).collect(),
        }
    }
}

/// Cart total for one currency, in minor units
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiCartTotal {
    pub currency: String,
    pub amount: i64,
}

// ============================================================================
// Callback Traits
// ============================================================================

/// Write side of the managed backend, implemented by the host SDK
#[uniffi::export(callback_interface)]
pub trait RemoteMessagesCallback: Send + Sync {
    /// Submit a newly created message
    fn add_message(&self, message: FfiMessage) -> Result<(), ChatError>;

    /// Document ID of the first record matching client, store and timestamp
    fn find_message(
        &self,
        client_id: String,
        store_id: String,
        timestamp: i64,
    ) -> Result<Option<String>, ChatError>;

    /// Overwrite the status of a record
    fn update_status(&self, document_id: String, status: FfiMessageStatus)
    -> Result<(), ChatError>;
}

/// Callback interface for store resolution progress
///
/// Both methods are called from `ChatService::pump`, on the host's thread.
#[uniffi::export(callback_interface)]
pub trait StoreResolutionCallback: Send + Sync {
    /// A store profile became available
    fn on_store(&self, profile: FfiStoreProfile);
    /// Every requested fetch has settled
    fn on_complete(&self, summary: FfiResolveSummary);
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Swift should implement this using os_log/Logger, Kotlin using Logcat.
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called when a log message is emitted
    ///
    /// `target` is the module path, e.g. "chat::sync".
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion_keeps_origin() {
        let message = Message::builder(MessageId::new("m1"), StoreId::new("s1"))
            .origin(Origin::Counterparty)
            .client_id(UserId::new("u1"))
            .timestamp(5)
            .status(MessageStatus::Delivered)
            .build();

        let ffi = FfiMessage::from(message.clone());
        assert!(!ffi.from_client);
        assert_eq!(ffi.status, FfiMessageStatus::Delivered);
        assert_eq!(Message::from(ffi), message);
    }

    #[test]
    fn test_profile_state() {
        let mut profile = StoreProfile::new(StoreId::new("s1"), "Shop");
        profile.location = Some(GeoPoint::new(1.5, 2.5));

        match FfiProfileState::from(ProfileLookup::Found(profile)) {
            FfiProfileState::Found { profile } => {
                assert_eq!(profile.latitude, Some(1.5));
                assert_eq!(profile.location(), Some(GeoPoint::new(1.5, 2.5)));
            }
            other => panic!("unexpected state: {:?}", other),
        }

        assert_eq!(
            FfiProfileState::from(ProfileLookup::Failed("HTTP 404".to_string())),
            FfiProfileState::Failed {
                reason: "HTTP 404".to_string()
            }
        );
    }

    #[test]
    fn test_anyhow_sqlite_error_maps_to_database() {
        let err = anyhow::Error::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(ChatError::from(err), ChatError::Database { .. }));

        let err = anyhow::anyhow!("connection reset");
        assert!(matches!(ChatError::from(err), ChatError::Backend { .. }));
    }
}
