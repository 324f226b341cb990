//! In-memory backend
//!
//! Behaves like the managed backend: records get backend-assigned document
//! IDs, filtered lookups return at most one record, and every change pushes a
//! full snapshot to each matching listener. Used by tests and the offline CLI.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Result, bail};
use log::debug;

use super::{
    ListenerRegistration, MessageFilter, RemoteMessages, RemoteRecord, SnapshotListener,
    SnapshotQuery, SnapshotSource,
};
use crate::models::{Message, MessageStatus};

type SharedListener = Arc<dyn Fn(Result<Vec<Message>>) + Send + Sync>;

struct Registered {
    id: u64,
    query: SnapshotQuery,
    listener: SharedListener,
}

/// Backend double holding records in memory
pub struct InMemoryRemote {
    records: RwLock<Vec<(String, Message)>>,
    listeners: Arc<Mutex<Vec<Registered>>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            offline: AtomicBool::new(false),
        }
    }

    /// A backend that fails every call
    pub fn offline() -> Self {
        let remote = Self::new();
        remote.set_offline(true);
        remote
    }

    /// Simulate losing (or regaining) connectivity
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("Backend unreachable");
        }
        Ok(())
    }

    /// All records, in write order
    pub fn messages(&self) -> Vec<Message> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Write a record as the store side would, notifying listeners
    pub fn deliver(&self, message: Message) -> String {
        let doc_id = self.insert_record(message);
        self.notify();
        doc_id
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    fn insert_record(&self, message: Message) -> String {
        let doc_id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records
            .write()
            .unwrap()
            .push((doc_id.clone(), message));
        doc_id
    }

    fn snapshot_for(&self, query: &SnapshotQuery) -> Vec<Message> {
        let records = self.records.read().unwrap();
        let mut matching: Vec<Message> = records
            .iter()
            .map(|(_, m)| m)
            .filter(|m| {
                m.client_id == query.client_id
                    && m.status == query.status
                    && m.is_from_counterparty()
            })
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.timestamp);
        matching
    }

    /// Push a fresh snapshot to every listener
    fn notify(&self) {
        let targets: Vec<(SnapshotQuery, SharedListener)> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.query.clone(), r.listener.clone()))
            .collect();

        for (query, listener) in targets {
            listener(Ok(self.snapshot_for(&query)));
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteMessages for InMemoryRemote {
    fn add_message(&self, message: &Message) -> Result<()> {
        self.ensure_online()?;
        self.insert_record(message.clone());
        self.notify();
        Ok(())
    }

    fn find_message(&self, filter: &MessageFilter) -> Result<Option<RemoteRecord>> {
        self.ensure_online()?;
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .find(|(_, m)| {
                m.client_id == filter.client_id
                    && m.store_id == filter.store_id
                    && m.timestamp == filter.timestamp
            })
            .map(|(doc_id, _)| RemoteRecord {
                document_id: doc_id.clone(),
            }))
    }

    fn update_status(&self, record: &RemoteRecord, status: MessageStatus) -> Result<()> {
        self.ensure_online()?;
        {
            let mut records = self.records.write().unwrap();
            let Some((_, message)) = records
                .iter_mut()
                .find(|(doc_id, _)| *doc_id == record.document_id)
            else {
                bail!("No such document: {}", record.document_id);
            };
            message.status = status;
        }
        self.notify();
        Ok(())
    }
}

impl SnapshotSource for InMemoryRemote {
    fn listen(
        &self,
        query: SnapshotQuery,
        listener: SnapshotListener,
    ) -> Result<ListenerRegistration> {
        self.ensure_online()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let listener: SharedListener = Arc::from(listener);
        debug!("Registering snapshot listener {} for {}", id, query.client_id.as_str());

        // Like the real backend, the current state is delivered immediately
        listener(Ok(self.snapshot_for(&query)));

        self.listeners.lock().unwrap().push(Registered {
            id,
            query,
            listener,
        });

        let listeners = self.listeners.clone();
        Ok(ListenerRegistration::new(move || {
            listeners.lock().unwrap().retain(|r| r.id != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, Origin, StoreId, UserId};

    fn from_store(id: &str, ts: i64) -> Message {
        Message::builder(MessageId::new(id), StoreId::new("s1"))
            .origin(Origin::Counterparty)
            .client_id(UserId::new("u1"))
            .timestamp(ts)
            .build()
    }

    #[test]
    fn test_listener_gets_filtered_sorted_snapshots() {
        let remote = InMemoryRemote::new();
        remote.deliver(from_store("m2", 200));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let registration = remote
            .listen(
                SnapshotQuery::inbound(UserId::new("u1")),
                Box::new(move |batch| {
                    let ids: Vec<String> =
                        batch.unwrap().iter().map(|m| m.id.0.clone()).collect();
                    sink.lock().unwrap().push(ids);
                }),
            )
            .unwrap();

        remote.deliver(from_store("m1", 100));
        // Not addressed to u1
        remote.deliver(
            Message::builder(MessageId::new("x"), StoreId::new("s1"))
                .origin(Origin::Counterparty)
                .client_id(UserId::new("u2"))
                .build(),
        );

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen[0], vec!["m2"]);
            assert_eq!(seen[1], vec!["m1", "m2"]);
            assert_eq!(seen[2], vec!["m1", "m2"]);
        }

        registration.remove();
        assert_eq!(remote.listener_count(), 0);
    }

    #[test]
    fn test_status_update_via_filter() {
        let remote = InMemoryRemote::new();
        let message = from_store("m1", 100);
        remote.deliver(message.clone());

        let record = remote
            .find_message(&MessageFilter::for_message(&message))
            .unwrap()
            .unwrap();
        assert_eq!(record.document_id, "doc-1");

        remote.update_status(&record, MessageStatus::Read).unwrap();
        assert_eq!(remote.messages()[0].status, MessageStatus::Read);
    }

    #[test]
    fn test_offline_fails_every_call() {
        let remote = InMemoryRemote::offline();
        let message = from_store("m1", 100);

        assert!(remote.add_message(&message).is_err());
        assert!(remote
            .find_message(&MessageFilter::for_message(&message))
            .is_err());
        assert!(remote
            .listen(SnapshotQuery::inbound(UserId::new("u1")), Box::new(|_| {}))
            .is_err());
    }
}
