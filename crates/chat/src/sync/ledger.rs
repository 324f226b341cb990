//! Dedup ledger for identifiers already requested this session

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Mutex;

/// Remembers which identifiers have been handed out for fetching
///
/// The check and the mark happen under one lock, so two concurrent callers
/// can never both be told to fetch the same identifier.
pub struct DedupLedger<K> {
    seen: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> DedupLedger<K> {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` exactly once per identifier, marking it seen
    pub fn should_fetch(&self, id: &K) -> bool {
        self.seen.lock().unwrap().insert(id.clone())
    }

    pub fn contains(&self, id: &K) -> bool {
        self.seen.lock().unwrap().contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything (session teardown)
    pub fn reset(&self) {
        self.seen.lock().unwrap().clear();
    }
}

impl<K: Eq + Hash + Clone> Default for DedupLedger<K> {
    fn default() -> Self {
        Self::new()
    }
}
