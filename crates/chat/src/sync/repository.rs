//! Message repository
//!
//! Owns the in-memory view of store messages and merges backend snapshots
//! into local storage. Merging is idempotent: a snapshot can be applied any
//! number of times without duplicating messages in storage or in the view.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::observable::{Observable, SubscriptionId};
use super::queue::QueueHandle;
use crate::actions::{StatusOutcome, StatusTracker};
use crate::models::{Message, MessageId, UserId};
use crate::remote::{ListenerRegistration, RemoteMessages, SnapshotQuery, SnapshotSource};
use crate::storage::ChatStore;

/// Statistics from merging one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Messages in the snapshot
    pub received: usize,
    /// Messages newly persisted
    pub inserted: usize,
    /// Messages already persisted
    pub skipped: usize,
    /// Messages that could not be persisted
    pub errors: usize,
}

/// Result of sending a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Stored locally and accepted by the backend
    Submitted,
    /// Stored locally; the backend call failed and a retry was recorded
    Pending(String),
}

/// Which backend call a retry entry re-attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    Send,
    ReadReceipt,
}

/// A backend call that failed and can be re-attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryEntry {
    pub kind: RetryKind,
    pub message_id: MessageId,
    pub last_error: String,
}

/// Outcome of one `retry_failed` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub remaining: usize,
}

/// Merges backend snapshots with local storage and publishes the result
pub struct MessageRepository {
    store: Arc<dyn ChatStore>,
    remote: Arc<dyn RemoteMessages>,
    tracker: StatusTracker,
    messages: Observable<Vec<Message>>,
    retries: Observable<Vec<RetryEntry>>,
}

impl MessageRepository {
    pub fn new(store: Arc<dyn ChatStore>, remote: Arc<dyn RemoteMessages>) -> Self {
        let tracker = StatusTracker::new(remote.clone(), store.clone());
        Self {
            store,
            remote,
            tracker,
            messages: Observable::default(),
            retries: Observable::default(),
        }
    }

    /// Current in-memory view, in delivery order
    pub fn messages(&self) -> Vec<Message> {
        self.messages.get()
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&Vec<Message>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.messages.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.messages.unsubscribe(id)
    }

    /// Backend calls waiting for a retry
    pub fn pending_retries(&self) -> Vec<RetryEntry> {
        self.retries.get()
    }

    pub fn subscribe_retries(
        &self,
        subscriber: impl Fn(&Vec<RetryEntry>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.retries.subscribe(subscriber)
    }

    /// Replace the in-memory view with everything in local storage
    ///
    /// Returns the number of messages loaded.
    pub fn load_local(&self) -> Result<usize> {
        let messages = self
            .store
            .list_messages()
            .context("Failed to load local messages")?;
        let count = messages.len();
        self.messages.set(messages);
        info!("Loaded {} local messages", count);
        Ok(count)
    }

    /// Merge one backend snapshot
    ///
    /// Each message is persisted unless already stored, and appended to the
    /// view unless a message with the same ID is already there. Storage
    /// failures are counted and logged; they never abort the merge.
    pub fn apply_remote_snapshot(&self, incoming: Vec<Message>) -> MergeStats {
        let mut stats = MergeStats {
            received: incoming.len(),
            ..MergeStats::default()
        };

        for message in &incoming {
            match self.store.insert_message(message.clone()) {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    warn!("Failed to store message {}: {:#}", message.id.as_str(), e);
                    stats.errors += 1;
                }
            }
        }

        self.messages.update_if(|view| {
            let mut known: HashSet<MessageId> = view.iter().map(|m| m.id.clone()).collect();
            let before = view.len();
            for message in incoming {
                if known.insert(message.id.clone()) {
                    view.push(message);
                }
            }
            view.len() != before
        });

        debug!(
            "Merged snapshot: {} received, {} inserted, {} skipped, {} errors",
            stats.received, stats.inserted, stats.skipped, stats.errors
        );
        stats
    }

    /// Store a message locally, then submit it to the backend
    ///
    /// The local copy is kept even if the backend call fails; the failure is
    /// recorded for `retry_failed`.
    pub fn send(&self, message: Message) -> Result<SendOutcome> {
        self.store
            .insert_message(message.clone())
            .context("Failed to store outgoing message")?;
        self.append_to_view(message.clone());

        match self.remote.add_message(&message) {
            Ok(()) => {
                info!("Sent message {} to {}", message.id.as_str(), message.store_id.as_str());
                Ok(SendOutcome::Submitted)
            }
            Err(e) => {
                warn!("Failed to send message {}: {:#}", message.id.as_str(), e);
                let reason = e.to_string();
                self.record_retry(RetryKind::Send, message.id, reason.clone());
                Ok(SendOutcome::Pending(reason))
            }
        }
    }

    /// Mark a store message as read on the backend and locally
    pub fn mark_read(&self, message: &Message) -> StatusOutcome {
        let mut message = message.clone();
        let outcome = self.tracker.mark_as_read(&mut message);
        self.reconcile(&message, &outcome, RetryKind::ReadReceipt);
        outcome
    }

    /// Mark a store message as delivered on the backend and locally
    pub fn mark_delivered(&self, message: &Message) -> StatusOutcome {
        let mut message = message.clone();
        let outcome = self.tracker.mark_as_delivered(&mut message);
        if outcome.is_updated() {
            self.set_view_status(&message);
        }
        outcome
    }

    /// Re-attempt every recorded backend failure
    ///
    /// Entries whose message no longer exists locally are dropped.
    pub fn retry_failed(&self) -> RetryReport {
        let pending = self.retries.get();
        let mut report = RetryReport {
            attempted: pending.len(),
            ..RetryReport::default()
        };
        if pending.is_empty() {
            return report;
        }

        info!("Retrying {} failed backend calls", pending.len());

        // Reconciled by key: entries recorded during the pass stay
        let mut resolved: HashSet<(RetryKind, MessageId)> = HashSet::new();
        let mut still_failing: Vec<RetryEntry> = Vec::new();
        for entry in pending {
            let message = match self.store.get_message(&entry.message_id) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    warn!("Dropping retry for missing message {}", entry.message_id.as_str());
                    resolved.insert((entry.kind, entry.message_id));
                    continue;
                }
                Err(e) => {
                    still_failing.push(RetryEntry {
                        last_error: e.to_string(),
                        ..entry
                    });
                    continue;
                }
            };

            let result = match entry.kind {
                RetryKind::Send => self.remote.add_message(&message).map_err(|e| e.to_string()),
                RetryKind::ReadReceipt => {
                    let mut message = message;
                    match self.tracker.mark_as_read(&mut message) {
                        StatusOutcome::Failed(e) => Err(e),
                        outcome => {
                            if outcome.is_updated() {
                                self.set_view_status(&message);
                            }
                            Ok(())
                        }
                    }
                }
            };

            match result {
                Ok(()) => {
                    report.succeeded += 1;
                    resolved.insert((entry.kind, entry.message_id));
                }
                Err(last_error) => still_failing.push(RetryEntry { last_error, ..entry }),
            }
        }

        report.remaining = self.retries.update(|entries| {
            entries.retain(|e| !resolved.contains(&(e.kind, e.message_id.clone())));
            for failed in still_failing {
                if let Some(existing) = entries
                    .iter_mut()
                    .find(|e| e.kind == failed.kind && e.message_id == failed.message_id)
                {
                    existing.last_error = failed.last_error;
                }
            }
            entries.len()
        });
        info!(
            "Retry pass: {} succeeded, {} remaining",
            report.succeeded, report.remaining
        );
        report
    }

    /// Subscribe to the user's inbound store messages
    ///
    /// Each snapshot is posted to `queue` and merged there. Delivery errors
    /// are logged only. The subscription lasts as long as the returned
    /// registration.
    pub fn attach(
        self: &Arc<Self>,
        source: &dyn SnapshotSource,
        user: UserId,
        queue: QueueHandle,
    ) -> Result<ListenerRegistration> {
        let repo = self.clone();
        let listener = Box::new(move |result: Result<Vec<Message>>| match result {
            Ok(batch) => {
                let repo = repo.clone();
                if !queue.post(move || {
                    repo.apply_remote_snapshot(batch);
                }) {
                    debug!("Main queue gone, dropping snapshot");
                }
            }
            Err(e) => warn!("Snapshot delivery failed: {:#}", e),
        });

        let registration = source
            .listen(SnapshotQuery::inbound(user.clone()), listener)
            .with_context(|| format!("Failed to subscribe to messages for {}", user.as_str()))?;
        info!("Subscribed to inbound messages for {}", user.as_str());
        Ok(registration)
    }

    /// Drop the in-memory view and pending retries (logout)
    pub fn reset(&self) {
        self.messages.set(Vec::new());
        self.retries.set(Vec::new());
    }

    fn reconcile(&self, message: &Message, outcome: &StatusOutcome, kind: RetryKind) {
        match outcome {
            StatusOutcome::Updated(_) => self.set_view_status(message),
            StatusOutcome::Failed(reason) => {
                self.record_retry(kind, message.id.clone(), reason.clone())
            }
            StatusOutcome::AlreadyAtStatus | StatusOutcome::NoMatch => {}
        }
    }

    fn append_to_view(&self, message: Message) {
        self.messages.update_if(|view| {
            if view.iter().any(|m| m.id == message.id) {
                return false;
            }
            view.push(message);
            true
        });
    }

    fn set_view_status(&self, message: &Message) {
        self.messages.update_if(|view| {
            match view.iter_mut().find(|m| m.id == message.id) {
                Some(existing) if existing.status != message.status => {
                    existing.status = message.status;
                    true
                }
                _ => false,
            }
        });
    }

    fn record_retry(&self, kind: RetryKind, message_id: MessageId, last_error: String) {
        self.retries.update(|entries| {
            match entries
                .iter_mut()
                .find(|e| e.kind == kind && e.message_id == message_id)
            {
                Some(existing) => existing.last_error = last_error,
                None => entries.push(RetryEntry {
                    kind,
                    message_id,
                    last_error,
                }),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageStatus, Origin, StoreId};
    use crate::remote::{InMemoryRemote, MessageFilter, RemoteRecord};
    use crate::storage::InMemoryChatStore;
    use crate::sync::MainQueue;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, mpsc};
    use std::time::Duration;

    fn from_store(id: &str, store: &str, ts: i64) -> Message {
        Message::builder(MessageId::new(id), StoreId::new(store))
            .text(format!("hello from {}", store))
            .origin(Origin::Counterparty)
            .client_id(UserId::new("u1"))
            .timestamp(ts)
            .build()
    }

    fn from_user(id: &str, store: &str, ts: i64) -> Message {
        Message::builder(MessageId::new(id), StoreId::new(store))
            .text("hi")
            .origin(Origin::User)
            .client_id(UserId::new("u1"))
            .timestamp(ts)
            .build()
    }

    /// Backend that holds sends of `slow` until released; every other send fails
    struct GatedRemote {
        online: AtomicBool,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl RemoteMessages for GatedRemote {
        fn add_message(&self, message: &Message) -> Result<()> {
            if !self.online.load(Ordering::SeqCst) || message.id.as_str() != "slow" {
                anyhow::bail!("Backend unreachable");
            }
            self.entered.lock().unwrap().send(()).unwrap();
            self.release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .unwrap();
            Ok(())
        }

        fn find_message(&self, _filter: &MessageFilter) -> Result<Option<RemoteRecord>> {
            Ok(None)
        }

        fn update_status(&self, _record: &RemoteRecord, _status: MessageStatus) -> Result<()> {
            Ok(())
        }
    }

    fn setup(remote: Arc<InMemoryRemote>) -> (Arc<InMemoryChatStore>, Arc<MessageRepository>) {
        let store = Arc::new(InMemoryChatStore::new());
        let repo = Arc::new(MessageRepository::new(store.clone(), remote));
        (store, repo)
    }

    #[test]
    fn test_repeated_snapshot_is_idempotent() {
        let (store, repo) = setup(Arc::new(InMemoryRemote::new()));
        let batch = vec![from_store("m1", "s1", 1), from_store("m2", "s1", 2)];

        let first = repo.apply_remote_snapshot(batch.clone());
        assert_eq!(first.inserted, 2);

        for _ in 0..3 {
            let again = repo.apply_remote_snapshot(batch.clone());
            assert_eq!(again.inserted, 0);
            assert_eq!(again.skipped, 2);
        }

        assert_eq!(store.count_messages().unwrap(), 2);
        assert_eq!(repo.messages().len(), 2);
    }

    #[test]
    fn test_overlapping_snapshots_extend_view() {
        let (_store, repo) = setup(Arc::new(InMemoryRemote::new()));
        repo.apply_remote_snapshot(vec![from_store("m1", "s1", 1)]);
        repo.apply_remote_snapshot(vec![from_store("m1", "s1", 1), from_store("m2", "s2", 2)]);

        let ids: Vec<String> = repo.messages().iter().map(|m| m.id.0.clone()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn test_duplicate_snapshot_does_not_notify() {
        let (_store, repo) = setup(Arc::new(InMemoryRemote::new()));
        let notifications = Arc::new(AtomicUsize::new(0));
        let counter = notifications.clone();
        repo.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        repo.apply_remote_snapshot(vec![from_store("m1", "s1", 1)]);
        repo.apply_remote_snapshot(vec![from_store("m1", "s1", 1)]);

        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_local_then_merge() {
        let (store, repo) = setup(Arc::new(InMemoryRemote::new()));
        store.insert_message(from_store("m1", "s1", 1)).unwrap();

        assert_eq!(repo.load_local().unwrap(), 1);
        let stats = repo.apply_remote_snapshot(vec![from_store("m1", "s1", 1)]);

        assert_eq!(stats.skipped, 1);
        assert_eq!(repo.messages().len(), 1);
    }

    #[test]
    fn test_send_keeps_local_copy_when_offline() {
        let remote = Arc::new(InMemoryRemote::offline());
        let (store, repo) = setup(remote.clone());

        let outcome = repo.send(from_user("m9", "s1", 10)).unwrap();
        assert!(matches!(outcome, SendOutcome::Pending(_)));
        assert!(store.has_message(&MessageId::new("m9")).unwrap());
        assert_eq!(repo.messages().len(), 1);

        let retries = repo.pending_retries();
        assert_eq!(retries.len(), 1);
        assert_eq!(retries[0].kind, RetryKind::Send);

        // Still offline: entry stays
        let report = repo.retry_failed();
        assert_eq!(report.remaining, 1);

        remote.set_offline(false);
        let report = repo.retry_failed();
        assert_eq!(report.succeeded, 1);
        assert!(repo.pending_retries().is_empty());
        assert_eq!(remote.messages().len(), 1);
    }

    #[test]
    fn test_mark_read_updates_view() {
        let remote = Arc::new(InMemoryRemote::new());
        let m1 = from_store("m1", "s1", 1);
        remote.deliver(m1.clone());
        let (store, repo) = setup(remote);
        repo.apply_remote_snapshot(vec![m1.clone()]);

        let outcome = repo.mark_read(&m1);

        assert_eq!(outcome, StatusOutcome::Updated(MessageStatus::Read));
        assert_eq!(repo.messages()[0].status, MessageStatus::Read);
        let stored = store.get_message(&m1.id).unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[test]
    fn test_failed_read_receipt_is_retried() {
        let remote = Arc::new(InMemoryRemote::new());
        let m1 = from_store("m1", "s1", 1);
        remote.deliver(m1.clone());
        let (_store, repo) = setup(remote.clone());
        repo.apply_remote_snapshot(vec![m1.clone()]);

        remote.set_offline(true);
        assert!(matches!(repo.mark_read(&m1), StatusOutcome::Failed(_)));
        assert_eq!(repo.messages()[0].status, MessageStatus::Sent);
        assert_eq!(repo.pending_retries()[0].kind, RetryKind::ReadReceipt);

        remote.set_offline(false);
        assert_eq!(repo.retry_failed().succeeded, 1);
        assert_eq!(repo.messages()[0].status, MessageStatus::Read);
    }

    #[test]
    fn test_no_match_is_not_retried() {
        let (_store, repo) = setup(Arc::new(InMemoryRemote::new()));
        let m1 = from_store("m1", "s1", 1);
        repo.apply_remote_snapshot(vec![m1.clone()]);

        assert_eq!(repo.mark_read(&m1), StatusOutcome::NoMatch);
        assert!(repo.pending_retries().is_empty());
    }

    #[test]
    fn test_attach_merges_on_main_queue() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.deliver(from_store("m1", "s1", 1));
        let (_store, repo) = setup(remote.clone());
        let queue = MainQueue::new();

        let _registration = repo
            .attach(remote.as_ref(), UserId::new("u1"), queue.handle())
            .unwrap();
        // Nothing merged until the queue runs
        assert!(repo.messages().is_empty());

        remote.deliver(from_store("m2", "s2", 2));
        assert!(queue.run_until(Duration::from_secs(5), || repo.messages().len() == 2));
        // Both snapshots contained m1
        assert_eq!(repo.messages().len(), 2);
    }

    #[test]
    fn test_failure_during_retry_pass_is_kept() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let remote = Arc::new(GatedRemote {
            online: AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let repo = MessageRepository::new(Arc::new(InMemoryChatStore::new()), remote.clone());

        let outcome = repo.send(from_user("slow", "s1", 1)).unwrap();
        assert!(matches!(outcome, SendOutcome::Pending(_)));
        remote.online.store(true, Ordering::SeqCst);

        let report = std::thread::scope(|s| {
            let pass = s.spawn(|| repo.retry_failed());
            entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

            // Fails while the pass is parked on "slow"
            let outcome = repo.send(from_user("other", "s1", 2)).unwrap();
            assert!(matches!(outcome, SendOutcome::Pending(_)));
            assert_eq!(repo.pending_retries().len(), 2);

            release_tx.send(()).unwrap();
            pass.join().unwrap()
        });

        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.remaining, 1);
        let pending: Vec<String> = repo
            .pending_retries()
            .iter()
            .map(|e| e.message_id.0.clone())
            .collect();
        assert_eq!(pending, vec!["other"]);
    }

    #[test]
    fn test_still_failing_entry_keeps_latest_error() {
        let remote = Arc::new(InMemoryRemote::offline());
        let (_store, repo) = setup(remote);
        repo.send(from_user("m1", "s1", 1)).unwrap();

        assert_eq!(repo.retry_failed().remaining, 1);
        let pending = repo.pending_retries();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_error, "Backend unreachable");
    }
}
