//! Bookkeeping of live worker threads.
//!
//! The registry is owned and mutated exclusively by the acceptor thread, so
//! it needs no synchronization of its own. Handles are kept in spawn order:
//! [`register`](WorkerRegistry::register) appends at the tail,
//! [`reap_finished`](WorkerRegistry::reap_finished) makes one non-blocking
//! pass joining workers that have already terminated, and
//! [`drain_all`](WorkerRegistry::drain_all) blocks until every remaining
//! worker has been joined.
//!
//! Invariant: every registered handle is joined exactly once, either by the
//! opportunistic reap or by the final drain, never both.

use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::server::worker::SessionOutcome;

/// Ordered collection of worker join handles.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    handles: Vec<JoinHandle<SessionOutcome>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly spawned worker handle at the tail.
    pub fn register(&mut self, handle: JoinHandle<SessionOutcome>) {
        self.handles.push(handle);
    }

    /// Returns the number of workers still registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no workers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// One non-blocking pass: join and unlink workers whose thread has
    /// already terminated, keep the rest in order.
    ///
    /// Returns the number of workers reaped. Invoked by the acceptor once
    /// per accepted connection.
    pub fn reap_finished(&mut self) -> usize {
        let mut live = Vec::with_capacity(self.handles.len());
        let mut reaped = 0;

        for handle in self.handles.drain(..) {
            if handle.is_finished() {
                join_one(handle);
                reaped += 1;
            } else {
                live.push(handle);
            }
        }

        self.handles = live;
        reaped
    }

    /// Blocking join of every remaining worker, in registration order.
    ///
    /// Invoked exactly once, during shutdown, after the acceptor has stopped
    /// accepting. Workers are never cancelled; this waits for each to reach
    /// a terminal state by natural means.
    pub fn drain_all(&mut self) -> usize {
        let mut drained = 0;
        for handle in self.handles.drain(..) {
            join_one(handle);
            drained += 1;
        }
        drained
    }
}

/// Joins one handle; a panicked worker is logged and still counts as joined.
fn join_one(handle: JoinHandle<SessionOutcome>) {
    match handle.join() {
        Ok(outcome) => debug!(?outcome, "worker joined"),
        Err(_) => warn!("worker thread panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn spawn_worker(release: Arc<AtomicBool>) -> JoinHandle<SessionOutcome> {
        thread::spawn(move || {
            while !release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            SessionOutcome::ShutdownSignaled
        })
    }

    #[test]
    fn reap_skips_running_workers() {
        init_test("registry_reap_skips_running_workers");
        let mut registry = WorkerRegistry::new();
        let release = Arc::new(AtomicBool::new(false));

        registry.register(spawn_worker(Arc::clone(&release)));
        registry.register(spawn_worker(Arc::clone(&release)));

        let reaped = registry.reap_finished();
        crate::assert_with_log!(reaped == 0, "nothing finished yet", 0, reaped);
        crate::assert_with_log!(registry.len() == 2, "both still live", 2, registry.len());

        release.store(true, Ordering::SeqCst);
        registry.drain_all();
        assert!(registry.is_empty());
        crate::test_complete!("registry_reap_skips_running_workers");
    }

    #[test]
    fn reap_unlinks_finished_workers() {
        init_test("registry_reap_unlinks_finished_workers");
        let mut registry = WorkerRegistry::new();

        let done = Arc::new(AtomicBool::new(true));
        let slow = Arc::new(AtomicBool::new(false));

        registry.register(spawn_worker(Arc::clone(&done)));
        registry.register(spawn_worker(Arc::clone(&slow)));

        // Give the finished worker time to actually terminate.
        thread::sleep(Duration::from_millis(50));

        let reaped = registry.reap_finished();
        crate::assert_with_log!(reaped == 1, "one reaped", 1, reaped);
        crate::assert_with_log!(registry.len() == 1, "one still live", 1, registry.len());

        slow.store(true, Ordering::SeqCst);
        let drained = registry.drain_all();
        crate::assert_with_log!(drained == 1, "remainder drained", 1, drained);
        crate::test_complete!("registry_reap_unlinks_finished_workers");
    }

    #[test]
    fn drain_joins_everything_in_order() {
        init_test("registry_drain_joins_everything_in_order");
        let mut registry = WorkerRegistry::new();
        let release = Arc::new(AtomicBool::new(true));

        for _ in 0..8 {
            registry.register(spawn_worker(Arc::clone(&release)));
        }

        let drained = registry.drain_all();
        crate::assert_with_log!(drained == 8, "all joined", 8, drained);
        assert!(registry.is_empty());

        // A second drain has nothing left to join.
        assert_eq!(registry.drain_all(), 0);
        crate::test_complete!("registry_drain_joins_everything_in_order");
    }

    #[test]
    fn panicked_worker_still_counts_as_joined() {
        init_test("registry_panicked_worker_still_counts_as_joined");
        let mut registry = WorkerRegistry::new();
        registry.register(thread::spawn(|| panic!("worker exploded")));

        thread::sleep(Duration::from_millis(50));
        let reaped = registry.reap_finished();
        crate::assert_with_log!(reaped == 1, "panicked worker reaped", 1, reaped);
        assert!(registry.is_empty());
        crate::test_complete!("registry_panicked_worker_still_counts_as_joined");
    }
}
