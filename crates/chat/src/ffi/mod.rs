//! FFI bindings for UniFFI export
//!
//! This module provides Swift/Kotlin bindings for the chat crate via UniFFI.
//!
//! ## Usage from Swift
//!
//! ```swift
//! import ChatFFI
//!
//! // Initialize logging first
//! initializeLogging(callback: myLogCallback, maxLevel: .info)
//!
//! // Open the service for the signed-in user
//! let service = try ChatService(
//!     dbPath: "/path/to/chat.db",
//!     userId: user.uid,
//!     baseUrl: nil,
//!     clientKey: keys.apiKey,
//!     remote: firestoreBridge
//! )
//! try service.loadLocal()
//!
//! // Feed every snapshot from the Firestore listener
//! let stats = service.applySnapshot(messages: batch)
//!
//! // Resolve stores, then drain results on the main thread
//! service.resolveConversationStores(callback: storeCallback)
//! service.pump()
//! let rows = service.listConversations()
//!
//! // Ask the assistant from a background task
//! let reply = try service.sendAssistantQuery(
//!     query: text, distanceKm: 10, latitude: lat, longitude: lon
//! )
//! ```

mod logging;
mod service;
mod types;

// Re-export all FFI types and the ChatService
pub use logging::{init_ffi_logger, set_log_callback, set_log_level};
pub use service::*;
pub use types::*;
