//! Store profile resolution
//!
//! Fetches each store profile at most once per session, fans the fetches out
//! on the rayon pool and fans the results back in through the main queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};

use super::observable::{Observable, SubscriptionId};
use crate::models::{ProfileLookup, StoreId, StoreProfile};
use crate::remote::StoreFetcher;
use crate::session::Session;

/// Snapshot of every store profile known this session
#[derive(Debug, Clone, Default)]
pub struct DirectoryState {
    profiles: Vec<StoreProfile>,
    failures: HashMap<StoreId, String>,
}

impl DirectoryState {
    /// Profiles in the order they were resolved
    pub fn profiles(&self) -> &[StoreProfile] {
        &self.profiles
    }

    pub fn lookup(&self, id: &StoreId) -> ProfileLookup {
        if let Some(profile) = self.profiles.iter().find(|p| &p.id == id) {
            return ProfileLookup::Found(profile.clone());
        }
        match self.failures.get(id) {
            Some(reason) => ProfileLookup::Failed(reason.clone()),
            None => ProfileLookup::NotYetResolved,
        }
    }
}

/// Shared, observable set of store profiles
///
/// Mutated only from main-queue jobs.
pub struct StoreDirectory {
    state: Observable<DirectoryState>,
}

impl StoreDirectory {
    pub fn new() -> Self {
        Self {
            state: Observable::default(),
        }
    }

    /// Add a profile unless one with the same ID is already present
    pub fn insert(&self, profile: StoreProfile) -> bool {
        self.insert_unless(profile, || false)
    }

    /// Like `insert`, but does nothing if `cancelled` holds
    ///
    /// `cancelled` is evaluated under the directory lock, so a concurrent
    /// `clear` either runs after the insert or is observed by it.
    pub fn insert_unless(&self, profile: StoreProfile, cancelled: impl FnOnce() -> bool) -> bool {
        self.state.update_if(|state| {
            if cancelled() || state.profiles.iter().any(|p| p.id == profile.id) {
                return false;
            }
            state.failures.remove(&profile.id);
            state.profiles.push(profile);
            true
        })
    }

    /// Remember why a fetch failed; ignored if the profile is already known
    pub fn record_failure(&self, id: StoreId, reason: String) {
        self.record_failure_unless(id, reason, || false);
    }

    /// Like `record_failure`, but does nothing if `cancelled` holds
    pub fn record_failure_unless(
        &self,
        id: StoreId,
        reason: String,
        cancelled: impl FnOnce() -> bool,
    ) -> bool {
        self.state.update_if(|state| {
            if cancelled() || state.profiles.iter().any(|p| p.id == id) {
                return false;
            }
            state.failures.insert(id, reason);
            true
        })
    }

    pub fn lookup(&self, id: &StoreId) -> ProfileLookup {
        self.state.with(|state| state.lookup(id))
    }

    pub fn snapshot(&self) -> DirectoryState {
        self.state.get()
    }

    pub fn profiles(&self) -> Vec<StoreProfile> {
        self.state.with(|state| state.profiles.clone())
    }

    pub fn len(&self) -> usize {
        self.state.with(|state| state.profiles.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.set(DirectoryState::default());
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&DirectoryState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }
}

impl Default for StoreDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one `resolve_stores` call, handed to its completion callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Fetches issued (identifiers that passed the ledger)
    pub requested: usize,
    /// Fetches that returned a profile
    pub resolved: usize,
    /// Fetches that returned an error
    pub failed: usize,
    /// The session ended before every fetch settled
    pub cancelled: bool,
}

enum Settled {
    Resolved,
    Failed,
    Skipped,
}

type ProfileCallback = Arc<dyn Fn(&StoreProfile) + Send + Sync>;

/// Resolves store identifiers to profiles for one session
pub struct StoreResolver {
    fetcher: Arc<dyn StoreFetcher>,
    session: Arc<Session>,
}

impl StoreResolver {
    pub fn new(fetcher: Arc<dyn StoreFetcher>, session: Arc<Session>) -> Self {
        Self { fetcher, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Fetch every store in `ids` not yet requested this session
    ///
    /// Fetches run concurrently. Each profile is added to the session's
    /// directory and passed to `on_each` on the main queue. `on_complete`
    /// runs on the main queue exactly once, after every issued fetch has
    /// settled. Returns the identifiers actually issued.
    pub fn resolve_stores<I, E, C>(&self, ids: I, on_each: E, on_complete: C) -> Vec<StoreId>
    where
        I: IntoIterator<Item = StoreId>,
        E: Fn(&StoreProfile) + Send + Sync + 'static,
        C: FnOnce(ResolveSummary) + Send + 'static,
    {
        let to_fetch: Vec<StoreId> = ids
            .into_iter()
            .filter(|id| self.session.ledger().should_fetch(id))
            .collect();
        let issued = to_fetch.clone();

        if to_fetch.is_empty() {
            debug!("No new stores to resolve");
            let cancelled = self.session.is_cancelled();
            self.session.queue().post(move || {
                on_complete(ResolveSummary {
                    cancelled,
                    ..ResolveSummary::default()
                })
            });
            return issued;
        }

        info!("Resolving {} store profile(s)", to_fetch.len());

        let fetcher = self.fetcher.clone();
        let session = self.session.clone();
        let on_each: ProfileCallback = Arc::new(on_each);

        rayon::spawn(move || {
            let resolved = AtomicUsize::new(0);
            let failed = AtomicUsize::new(0);

            // Barrier: scope returns only after every spawned fetch settled
            rayon::scope(|s| {
                for id in &to_fetch {
                    let fetcher = &fetcher;
                    let session = &session;
                    let on_each = &on_each;
                    let resolved = &resolved;
                    let failed = &failed;

                    s.spawn(move |_| {
                        match settle(fetcher.as_ref(), session, id, on_each) {
                            Settled::Resolved => resolved.fetch_add(1, Ordering::SeqCst),
                            Settled::Failed => failed.fetch_add(1, Ordering::SeqCst),
                            Settled::Skipped => 0,
                        };
                    });
                }
            });

            let summary = ResolveSummary {
                requested: to_fetch.len(),
                resolved: resolved.into_inner(),
                failed: failed.into_inner(),
                cancelled: session.is_cancelled(),
            };
            info!(
                "Store resolution settled: {} resolved, {} failed of {}{}",
                summary.resolved,
                summary.failed,
                summary.requested,
                if summary.cancelled { " (cancelled)" } else { "" }
            );

            session.queue().post(move || on_complete(summary));
        });

        issued
    }
}

/// Fetch one store and post its result to the main queue
fn settle(
    fetcher: &dyn StoreFetcher,
    session: &Arc<Session>,
    id: &StoreId,
    on_each: &ProfileCallback,
) -> Settled {
    if session.is_cancelled() {
        return Settled::Skipped;
    }

    let result = fetcher.fetch_store(id);
    // Results of fetches that outlive the session are discarded uncounted
    if session.is_cancelled() {
        debug!("Discarding store {} fetched after teardown", id.as_str());
        return Settled::Skipped;
    }

    match result {
        Ok(profile) => {
            debug!("Fetched store {} ({})", id.as_str(), profile.name);
            let job_session = session.clone();
            let on_each = on_each.clone();
            session.queue().post(move || {
                if job_session.add_profile(profile.clone()) {
                    on_each(&profile);
                } else {
                    debug!("Store {} not added", profile.id.as_str());
                }
            });
            Settled::Resolved
        }
        Err(e) => {
            warn!("Failed to fetch store {}: {}", id.as_str(), e);
            let job_session = session.clone();
            let id = id.clone();
            let reason = e.to_string();
            session.queue().post(move || {
                job_session.record_fetch_failure(id, reason);
            });
            Settled::Failed
        }
    }
}
