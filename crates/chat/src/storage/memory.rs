//! In-memory storage implementation
//!
//! Used for tests and for hosts that don't need messages to survive a
//! restart.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::ChatStore;
use crate::models::{AssistantMessage, Message, MessageId, MessageStatus};

/// Messages in insertion order plus an ID index into that order
#[derive(Default)]
struct MessageTable {
    rows: Vec<Message>,
    index: HashMap<String, usize>,
}

/// In-memory implementation of ChatStore
///
/// Each table sits behind a single RwLock so insert-if-absent is one
/// critical section.
pub struct InMemoryChatStore {
    messages: RwLock<MessageTable>,
    assistant_log: RwLock<Vec<AssistantMessage>>,
}

impl InMemoryChatStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(MessageTable::default()),
            assistant_log: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore for InMemoryChatStore {
    fn list_messages(&self) -> Result<Vec<Message>> {
        let table = self.messages.read().unwrap();
        let mut result = table.rows.clone();

        // Stable: equal timestamps keep insertion order
        result.sort_by_key(|m| m.timestamp);

        Ok(result)
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let table = self.messages.read().unwrap();
        Ok(table.index.get(&id.0).map(|&pos| table.rows[pos].clone()))
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let table = self.messages.read().unwrap();
        Ok(table.index.contains_key(&id.0))
    }

    fn insert_message(&self, message: Message) -> Result<bool> {
        let mut table = self.messages.write().unwrap();
        if table.index.contains_key(&message.id.0) {
            return Ok(false);
        }

        let pos = table.rows.len();
        table.index.insert(message.id.0.clone(), pos);
        table.rows.push(message);
        Ok(true)
    }

    fn update_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<bool> {
        let mut table = self.messages.write().unwrap();
        let Some(&pos) = table.index.get(&id.0) else {
            return Ok(false);
        };
        table.rows[pos].status = status;
        Ok(true)
    }

    fn count_messages(&self) -> Result<usize> {
        Ok(self.messages.read().unwrap().rows.len())
    }

    fn insert_assistant_message(&self, message: AssistantMessage) -> Result<()> {
        self.assistant_log.write().unwrap().push(message);
        Ok(())
    }

    fn list_assistant_messages(&self) -> Result<Vec<AssistantMessage>> {
        let mut result = self.assistant_log.read().unwrap().clone();
        result.sort_by_key(|m| m.timestamp);
        Ok(result)
    }

    fn delete_assistant_messages(&self) -> Result<usize> {
        let mut log = self.assistant_log.write().unwrap();
        let removed = log.len();
        log.clear();
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        *self.messages.write().unwrap() = MessageTable::default();
        self.assistant_log.write().unwrap().clear();
        Ok(())
    }
}
