//! Session-scoped state
//!
//! Everything that must not outlive a signed-in user lives here: the
//! store-fetch ledger, the store directory and the cancellation flag for
//! in-flight background work.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::models::{StoreId, StoreProfile, UserId};
use crate::sync::{DedupLedger, QueueHandle, StoreDirectory};

/// Context shared by the components serving one signed-in user
pub struct Session {
    user_id: UserId,
    ledger: DedupLedger<StoreId>,
    directory: StoreDirectory,
    queue: QueueHandle,
    cancelled: AtomicBool,
}

impl Session {
    pub fn new(user_id: UserId, queue: QueueHandle) -> Self {
        Self {
            user_id,
            ledger: DedupLedger::new(),
            directory: StoreDirectory::new(),
            queue,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn ledger(&self) -> &DedupLedger<StoreId> {
        &self.ledger
    }

    pub fn directory(&self) -> &StoreDirectory {
        &self.directory
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Add a resolved profile to the directory unless the session has ended
    ///
    /// Cancellation is checked under the directory lock, so a profile can
    /// never land after `teardown` cleared the directory.
    pub fn add_profile(&self, profile: StoreProfile) -> bool {
        self.directory.insert_unless(profile, || self.is_cancelled())
    }

    /// Record a failed fetch unless the session has ended
    pub fn record_fetch_failure(&self, id: StoreId, reason: String) -> bool {
        self.directory
            .record_failure_unless(id, reason, || self.is_cancelled())
    }

    /// End the session (logout)
    ///
    /// Outstanding store fetches stop delivering results, and the ledger and
    /// directory are emptied. A torn-down session is never revived; sign-in
    /// creates a new one.
    pub fn teardown(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Tearing down session for {}", self.user_id.as_str());
        self.ledger.reset();
        self.directory.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileLookup;
    use crate::sync::MainQueue;

    #[test]
    fn test_teardown_clears_session_state() {
        let queue = MainQueue::new();
        let session = Session::new(UserId::new("u1"), queue.handle());

        assert!(session.ledger().should_fetch(&StoreId::new("s1")));
        session
            .directory()
            .insert(StoreProfile::new(StoreId::new("s1"), "Shop"));

        session.teardown();

        assert!(session.is_cancelled());
        assert!(session.ledger().is_empty());
        assert!(session.directory().is_empty());

        // Second teardown is a no-op
        session.teardown();
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_torn_down_session_accepts_no_profiles() {
        let queue = MainQueue::new();
        let session = Session::new(UserId::new("u1"), queue.handle());
        assert!(session.add_profile(StoreProfile::new(StoreId::new("s1"), "Shop")));

        session.teardown();

        assert!(!session.add_profile(StoreProfile::new(StoreId::new("s2"), "Kiosk")));
        assert!(!session.record_fetch_failure(StoreId::new("s3"), "HTTP 500".into()));
        assert!(session.directory().is_empty());
        assert_eq!(
            session.directory().lookup(&StoreId::new("s3")),
            ProfileLookup::NotYetResolved
        );
    }
}
