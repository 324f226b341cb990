//! Single-writer main queue
//!
//! Background work never touches observable state directly. It posts a job
//! through a [`QueueHandle`]; the thread that owns the [`MainQueue`] drains
//! and runs the jobs in FIFO order.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send>;

/// Cloneable, thread-safe handle for posting jobs to a [`MainQueue`]
#[derive(Clone)]
pub struct QueueHandle {
    tx: Sender<Job>,
}

impl QueueHandle {
    /// Post a job; returns `false` if the owning queue has been dropped
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }
}

/// Job queue owned by the UI-affine thread
///
/// Not `Sync`: only the owner can run jobs.
pub struct MainQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
}

impl MainQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every job queued so far, returning how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Run jobs as they arrive until `done` returns true or `timeout` elapses
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            match self.rx.recv_timeout(deadline - now) {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => return done(),
                // We hold a sender ourselves, so this can't happen
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}
