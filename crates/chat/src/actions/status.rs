//! Status transitions for store messages
//!
//! Coordinates between the backend and local storage when a message is
//! read or delivered.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::models::{Message, MessageStatus};
use crate::remote::{MessageFilter, RemoteMessages};
use crate::storage::ChatStore;

/// Result of a status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Backend and local copy now carry the new status
    Updated(MessageStatus),
    /// The message is already at (or past) the requested status
    AlreadyAtStatus,
    /// No backend record matched the message
    NoMatch,
    /// The backend call failed; the local copy is unchanged
    Failed(String),
}

impl StatusOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, StatusOutcome::Updated(_))
    }
}

/// Applies status changes to backend records and reconciles local copies
///
/// Transitions happen in two steps:
/// 1. Locate the backend record and update its status
/// 2. Update the local copy and persist it
///
/// The backend is the source of truth: local state changes only after the
/// backend accepted the update.
pub struct StatusTracker {
    remote: Arc<dyn RemoteMessages>,
    store: Arc<dyn ChatStore>,
}

impl StatusTracker {
    pub fn new(remote: Arc<dyn RemoteMessages>, store: Arc<dyn ChatStore>) -> Self {
        Self { remote, store }
    }

    pub fn mark_as_read(&self, message: &mut Message) -> StatusOutcome {
        self.advance(message, MessageStatus::Read)
    }

    pub fn mark_as_delivered(&self, message: &mut Message) -> StatusOutcome {
        self.advance(message, MessageStatus::Delivered)
    }

    /// Move `message` forward to `status`
    ///
    /// The backend record is found by client, store and timestamp, limited to
    /// one match. Never moves a status backwards.
    pub fn advance(&self, message: &mut Message, status: MessageStatus) -> StatusOutcome {
        if !message.status.can_advance_to(status) {
            debug!(
                "Message {} already {}, not moving to {}",
                message.id.as_str(),
                message.status.as_str(),
                status.as_str()
            );
            return StatusOutcome::AlreadyAtStatus;
        }

        let filter = MessageFilter::for_message(message);
        let record = match self.remote.find_message(&filter) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No backend record for message {}", message.id.as_str());
                return StatusOutcome::NoMatch;
            }
            Err(e) => {
                warn!("Failed to look up message {}: {:#}", message.id.as_str(), e);
                return StatusOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.remote.update_status(&record, status) {
            warn!(
                "Failed to mark message {} as {}: {:#}",
                message.id.as_str(),
                status.as_str(),
                e
            );
            return StatusOutcome::Failed(e.to_string());
        }

        message.status = status;
        match self.store.update_message_status(&message.id, status) {
            Ok(true) => {}
            Ok(false) => debug!("Message {} not stored locally", message.id.as_str()),
            Err(e) => warn!(
                "Failed to persist status for message {}: {:#}",
                message.id.as_str(),
                e
            ),
        }

        info!("Marked message {} as {}", message.id.as_str(), status.as_str());
        StatusOutcome::Updated(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, Origin, StoreId, UserId};
    use crate::remote::{InMemoryRemote, RemoteRecord};
    use crate::storage::InMemoryChatStore;
    use anyhow::{Result, bail};

    /// Finds records but refuses to update them
    struct ReadOnlyRemote;

    impl RemoteMessages for ReadOnlyRemote {
        fn add_message(&self, _message: &Message) -> Result<()> {
            bail!("read only")
        }

        fn find_message(&self, _filter: &MessageFilter) -> Result<Option<RemoteRecord>> {
            Ok(Some(RemoteRecord {
                document_id: "doc-1".to_string(),
            }))
        }

        fn update_status(&self, _record: &RemoteRecord, _status: MessageStatus) -> Result<()> {
            bail!("permission denied")
        }
    }

    fn m1() -> Message {
        Message::builder(MessageId::new("m1"), StoreId::new("s1"))
            .text("Your order shipped")
            .origin(Origin::Counterparty)
            .client_id(UserId::new("u1"))
            .timestamp(1_000)
            .status(MessageStatus::Sent)
            .build()
    }

    fn setup(remote: Arc<dyn RemoteMessages>) -> (Arc<InMemoryChatStore>, StatusTracker) {
        let store = Arc::new(InMemoryChatStore::new());
        store.insert_message(m1()).unwrap();
        let tracker = StatusTracker::new(remote, store.clone());
        (store, tracker)
    }

    #[test]
    fn test_mark_as_read_updates_backend_and_local() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.deliver(m1());
        let (store, tracker) = setup(remote.clone());

        let mut message = m1();
        let outcome = tracker.mark_as_read(&mut message);

        assert_eq!(outcome, StatusOutcome::Updated(MessageStatus::Read));
        assert_eq!(message.status, MessageStatus::Read);
        assert_eq!(remote.messages()[0].status, MessageStatus::Read);
        let stored = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[test]
    fn test_failed_update_leaves_local_unchanged() {
        let (store, tracker) = setup(Arc::new(ReadOnlyRemote));

        let mut message = m1();
        let outcome = tracker.mark_as_read(&mut message);

        assert!(matches!(outcome, StatusOutcome::Failed(ref e) if e.contains("permission")));
        assert_eq!(message.status, MessageStatus::Sent);
        let stored = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Sent);
    }

    #[test]
    fn test_unreachable_backend_is_a_failure() {
        let (_store, tracker) = setup(Arc::new(InMemoryRemote::offline()));

        let mut message = m1();
        assert!(matches!(
            tracker.mark_as_delivered(&mut message),
            StatusOutcome::Failed(_)
        ));
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[test]
    fn test_no_match_is_silent() {
        let (store, tracker) = setup(Arc::new(InMemoryRemote::new()));

        let mut message = m1();
        assert_eq!(tracker.mark_as_read(&mut message), StatusOutcome::NoMatch);
        assert_eq!(message.status, MessageStatus::Sent);
        let stored = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Sent);
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.deliver(m1());
        let (_store, tracker) = setup(remote.clone());

        let mut message = m1();
        assert!(tracker.mark_as_read(&mut message).is_updated());
        assert_eq!(
            tracker.mark_as_delivered(&mut message),
            StatusOutcome::AlreadyAtStatus
        );
        assert_eq!(
            tracker.mark_as_read(&mut message),
            StatusOutcome::AlreadyAtStatus
        );
        assert_eq!(message.status, MessageStatus::Read);
        assert_eq!(remote.messages()[0].status, MessageStatus::Read);
    }
}
