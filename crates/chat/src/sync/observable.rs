//! Observable value container
//!
//! Holds a value and a list of subscribers that are called synchronously,
//! in subscription order, after every mutation.

use std::sync::{Arc, Mutex};

/// Identifies a subscription so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct State<T> {
    value: T,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: u64,
}

/// A value with synchronous change notification
///
/// Subscribers run on the thread that performed the mutation, after the
/// internal lock is released, so a subscriber may read the observable
/// again without deadlocking.
pub struct Observable<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(State {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.state.lock().unwrap().value.clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.lock().unwrap().value)
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place and notify subscribers
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, value, subscribers) = {
            let mut state = self.state.lock().unwrap();
            let result = f(&mut state.value);
            let subscribers: Vec<_> = state.subscribers.iter().map(|(_, s)| s.clone()).collect();
            (result, state.value.clone(), subscribers)
        };

        for subscriber in subscribers {
            subscriber(&value);
        }
        result
    }

    /// Mutate the value, notifying subscribers only if `f` returns true
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let notify = {
            let mut state = self.state.lock().unwrap();
            if f(&mut state.value) {
                let subscribers: Vec<_> =
                    state.subscribers.iter().map(|(_, s)| s.clone()).collect();
                Some((state.value.clone(), subscribers))
            } else {
                None
            }
        };

        match notify {
            Some((value, subscribers)) => {
                for subscriber in subscribers {
                    subscriber(&value);
                }
                true
            }
            None => false,
        }
    }

    /// Register a subscriber; it is not called with the current value
    pub fn subscribe(&self, subscriber: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut state = self.state.lock().unwrap();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a subscriber, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
