//! Event-count wake protocol for sleeping workers.
//!
//! A worker snapshots `wake_seq` before its fast-path dequeue attempt.
//! Every successful submission bumps the counter, so if a task arrived
//! after the snapshot the subsequent wait observes `wake_seq` moved and
//! returns without blocking. That ordering is what rules out the lost
//! wakeup; snapshotting after the dequeue attempt would reopen it.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
pub(crate) struct WakeCoordinator {
    wake_seq: AtomicU64,
    stop: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl WakeCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            wake_seq: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Current value of the monotone wake sequence.
    pub(crate) fn current_seq(&self) -> u64 {
        self.wake_seq.load(Ordering::Acquire)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Announces one new unit of work. Called after the enqueue has
    /// succeeded, never before. The bump happens under the mutex: a
    /// worker between its predicate check and its sleep still holds
    /// the lock, so the bump cannot land in that window and vanish.
    pub(crate) fn publish_wake(&self) {
        {
            let _guard = self.lock.lock();
            self.wake_seq.fetch_add(1, Ordering::AcqRel);
        }
        self.cond.notify_one();
    }

    /// Sets the stop flag and rouses every sleeping worker. Safe to
    /// call any number of times; the flag is never cleared.
    pub(crate) fn publish_stop_all(&self) {
        {
            let _guard = self.lock.lock();
            self.stop.store(true, Ordering::Release);
            self.wake_seq.fetch_add(1, Ordering::AcqRel);
        }
        self.cond.notify_all();
    }

    /// Blocks until stop is requested or the sequence has moved past
    /// `seen`; returns the sequence value observed on wake.
    pub(crate) fn wait_until_changed(&self, seen: u64) -> u64 {
        let mut guard = self.lock.lock();
        while !self.stop.load(Ordering::Acquire)
            && self.wake_seq.load(Ordering::Acquire) == seen
        {
            self.cond.wait(&mut guard);
        }
        self.wake_seq.load(Ordering::Acquire)
    }
}
