//! Query API for UI consumption
//!
//! Provides pure functions that turn the flat message view into the
//! conversation list shown to the user.

mod conversations;

pub use conversations::{
    ConversationSummary, conversation_for_store, group_and_sort, list_conversations, store_ids,
    total_unread,
};
