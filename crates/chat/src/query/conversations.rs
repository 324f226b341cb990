//! Conversation query functions

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::{Conversation, Message, ProfileLookup, StoreId};
use crate::sync::StoreDirectory;

/// A conversation paired with what is known about its store
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub store: ProfileLookup,
}

impl ConversationSummary {
    /// Store name, or the raw store ID while the profile is unavailable
    pub fn title(&self) -> String {
        self.store.display_name(&self.conversation.store_id).to_string()
    }

    /// Text of the most recent message
    pub fn preview(&self) -> Option<&str> {
        self.conversation.last_message().map(|m| m.text.as_str())
    }
}

/// Group messages into one conversation per store
///
/// Messages are first stable-sorted by timestamp, so each conversation is
/// chronological and equal timestamps keep their input order. Conversations
/// are returned newest first by last-message timestamp; ties keep the order
/// in which their stores first appeared. The result is a pure function of
/// the input sequence.
pub fn group_and_sort(messages: &[Message]) -> Vec<Conversation> {
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    let mut slots: HashMap<&StoreId, usize> = HashMap::new();
    let mut partitions: Vec<(StoreId, Vec<Message>)> = Vec::new();
    for message in ordered {
        let slot = *slots.entry(&message.store_id).or_insert_with(|| {
            partitions.push((message.store_id.clone(), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(message.clone());
    }

    let mut conversations: Vec<Conversation> = partitions
        .into_iter()
        .map(|(store_id, messages)| Conversation::new(store_id, messages))
        .collect();

    // None sorts below every timestamp, so empty partitions land last
    conversations.sort_by_key(|c| Reverse(c.last_timestamp()));
    conversations
}

/// Grouped conversations with their store profiles attached
pub fn list_conversations(
    messages: &[Message],
    directory: &StoreDirectory,
) -> Vec<ConversationSummary> {
    let profiles = directory.snapshot();
    group_and_sort(messages)
        .into_iter()
        .map(|conversation| {
            let store = profiles.lookup(&conversation.store_id);
            ConversationSummary {
                conversation,
                store,
            }
        })
        .collect()
}

/// Conversation with a single store, if any messages exist for it
pub fn conversation_for_store(messages: &[Message], store_id: &StoreId) -> Option<Conversation> {
    let mut thread: Vec<Message> = messages
        .iter()
        .filter(|m| &m.store_id == store_id)
        .cloned()
        .collect();
    if thread.is_empty() {
        return None;
    }
    thread.sort_by_key(|m| m.timestamp);
    Some(Conversation::new(store_id.clone(), thread))
}

/// Unread messages across all conversations (badge count)
pub fn total_unread(conversations: &[Conversation]) -> usize {
    conversations.iter().map(|c| c.unread_count).sum()
}

/// Store IDs in the order they first appear in `messages`
pub fn store_ids(messages: &[Message]) -> Vec<StoreId> {
    let mut seen = std::collections::HashSet::new();
    messages
        .iter()
        .filter(|m| seen.insert(&m.store_id))
        .map(|m| m.store_id.clone())
        .collect()
}
