//! Sync engine for merging backend messages and resolving stores
//!
//! Merges are idempotent and can be safely repeated. Background work reports
//! back through the main queue, which is the only place observable state is
//! mutated.

mod ledger;
mod observable;
mod queue;
mod repository;
mod stores;

pub use ledger::DedupLedger;
pub use observable::{Observable, SubscriptionId};
pub use queue::{MainQueue, QueueHandle};
pub use repository::{
    MergeStats, MessageRepository, RetryEntry, RetryKind, RetryReport, SendOutcome,
};
pub use stores::{DirectoryState, ResolveSummary, StoreDirectory, StoreResolver};
