//! Chat crate - Business logic for the Souk shopping chat
//!
//! This crate provides the platform-independent core beneath the mobile UI:
//! - Domain models (Message, StoreProfile, Conversation, Cart)
//! - Storage trait abstractions with in-memory and SQLite backends
//! - Backend traits plus an HTTP client for store profiles
//! - Idempotent message sync and once-per-session store resolution
//! - Conversation grouping for the chat list
//! - Read/delivered status transitions
//! - The shopping assistant and its product search
//!
//! This crate has zero UI dependencies and is exported to Swift/Kotlin
//! through UniFFI (see the `chat-ffi` crate).

uniffi::setup_scaffolding!();

pub mod actions;
pub mod config;
pub mod ffi;
pub mod models;
pub mod query;
pub mod remote;
pub mod session;
pub mod settings;
pub mod storage;
pub mod sync;

pub use actions::{Assistant, SearchArea, StatusOutcome, StatusTracker};
pub use config::ChatConfig;
pub use models::{
    AssistantMessage, Cart, ContactInfo, Conversation, GeoPoint, Message, MessageId,
    MessageStatus, Origin, Product, ProfileLookup, StoreId, StoreProfile, UserId,
};
pub use query::{
    ConversationSummary, conversation_for_store, group_and_sort, list_conversations, store_ids,
    total_unread,
};
pub use remote::{
    AssistantClient, FetchError, HttpStoreFetcher, InMemoryRemote, ListenerRegistration,
    MessageFilter, ProductSearch, RemoteMessages, RemoteRecord, SnapshotQuery, SnapshotSource,
    StoreFetcher,
};
pub use session::Session;
pub use settings::Settings;
pub use storage::{ChatStore, InMemoryChatStore, SqliteChatStore};
pub use sync::{
    DedupLedger, MainQueue, MergeStats, MessageRepository, Observable, QueueHandle, ResolveSummary,
    RetryEntry, RetryKind, RetryReport, SendOutcome, StoreDirectory, StoreResolver,
};
