//! Storage trait definitions

use crate::models::{AssistantMessage, Message, MessageId, MessageStatus};
use anyhow::Result;

/// Trait for local chat storage operations
///
/// This trait abstracts over different storage backends (in-memory, SQLite)
/// and provides the operations the sync engine needs. Implementations must
/// make `insert_message` an atomic insert-if-absent.
pub trait ChatStore: Send + Sync {
    /// List all store messages, ordered by timestamp ascending
    ///
    /// Messages sharing a timestamp keep their insertion order.
    fn list_messages(&self) -> Result<Vec<Message>>;

    /// Get a message by ID
    fn get_message(&self, id: &MessageId) -> Result<Option<Message>>;

    /// Check if a message exists
    fn has_message(&self, id: &MessageId) -> Result<bool>;

    /// Insert a message unless one with the same ID already exists
    ///
    /// Returns `true` if the message was inserted.
    fn insert_message(&self, message: Message) -> Result<bool>;

    /// Overwrite the status of an existing message
    ///
    /// Returns `false` if no message with that ID exists.
    fn update_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<bool>;

    /// Count stored messages
    fn count_messages(&self) -> Result<usize>;

    /// Append an entry to the assistant log
    fn insert_assistant_message(&self, message: AssistantMessage) -> Result<()>;

    /// List the assistant log, oldest first
    fn list_assistant_messages(&self) -> Result<Vec<AssistantMessage>>;

    /// Purge the whole assistant log, returning how many entries were removed
    fn delete_assistant_messages(&self) -> Result<usize>;

    /// Clear all data (logout, tests)
    fn clear(&self) -> Result<()>;
}
