//! Shutdown flag and termination signal registration.
//!
//! Shutdown is strictly cooperative: a single set-once boolean is shared by
//! the acceptor, every worker's lock-wait loop, and the timer teardown path.
//! Nothing is forcibly terminated; every loop observes the flag at its own
//! polling points and winds down by natural means.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shared, atomically-observable shutdown flag.
///
/// Clones share one underlying flag. The flag is set-once: once requested,
/// shutdown cannot be revoked, and repeated requests are idempotent.
///
/// # Example
///
/// ```
/// use linelogd::ShutdownFlag;
///
/// let flag = ShutdownFlag::new();
/// let observer = flag.clone();
///
/// assert!(!observer.is_requested());
/// flag.request();
/// assert!(observer.is_requested());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Creates a new flag in the not-requested state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests shutdown. Idempotent.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn shared(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }
}

/// Registers SIGINT and SIGTERM to set the given flag.
///
/// Both signals map to the same effect; receiving either (or both, in any
/// order) requests shutdown exactly once. The handlers only set the atomic,
/// so they are async-signal-safe.
pub fn install_signal_handlers(flag: &ShutdownFlag) -> io::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, flag.shared())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn initial_state_not_requested() {
        init_test("shutdown_initial_state_not_requested");
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
        crate::test_complete!("shutdown_initial_state_not_requested");
    }

    #[test]
    fn request_is_sticky_and_idempotent() {
        init_test("shutdown_request_is_sticky_and_idempotent");
        let flag = ShutdownFlag::new();
        flag.request();
        flag.request();
        assert!(flag.is_requested());
        crate::test_complete!("shutdown_request_is_sticky_and_idempotent");
    }

    #[test]
    fn clones_share_state() {
        init_test("shutdown_clones_share_state");
        let flag = ShutdownFlag::new();
        let observer = flag.clone();

        flag.request();
        crate::assert_with_log!(
            observer.is_requested(),
            "clone sees request",
            true,
            observer.is_requested()
        );
        crate::test_complete!("shutdown_clones_share_state");
    }

    #[test]
    fn flag_is_observable_across_threads() {
        init_test("shutdown_flag_is_observable_across_threads");
        let flag = ShutdownFlag::new();
        let observer = flag.clone();

        let waiter = std::thread::spawn(move || {
            while !observer.is_requested() {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });

        flag.request();
        waiter.join().expect("waiter thread");
        crate::test_complete!("shutdown_flag_is_observable_across_threads");
    }
}
