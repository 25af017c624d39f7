//! Periodic timestamp producer.
//!
//! One background thread fires on a fixed cadence (near-zero initial delay,
//! then every configured interval), formats a timestamp record, and appends
//! it to the shared log through the same lock every worker uses — from the
//! log's perspective the timer is just another producer. Running the ticks on
//! a single thread also strictly serializes them: a slow tick delays the next
//! firing instead of overlapping it.
//!
//! The timer is armed once at startup and torn down at shutdown. Teardown
//! stops scheduling new firings; a tick already in flight is short-lived and
//! allowed to finish, which is why the tick itself never polls the shutdown
//! flag.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::log::SharedLog;

/// Granularity of the stop-flag check while waiting for the next firing.
const TEARDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Formats one timestamp record for the given instant.
///
/// The record is a single line: `timestamp:` followed by the RFC 2822
/// rendering of `now`.
///
/// # Example
///
/// ```
/// use time::macros::datetime;
///
/// let record = linelogd::timestamp_record(datetime!(2026-08-30 12:00:00 UTC));
/// assert_eq!(record, "timestamp:Sun, 30 Aug 2026 12:00:00 +0000\n");
/// ```
#[must_use]
pub fn timestamp_record(now: OffsetDateTime) -> String {
    let formatted = now
        .format(&Rfc2822)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("timestamp:{formatted}\n")
}

/// Handle to the armed timestamp timer.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) stops
/// scheduling new firings and joins the timer thread.
#[derive(Debug)]
pub struct TimestampTimer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimestampTimer {
    /// Arms the timer: first firing almost immediately, then every
    /// `interval`.
    ///
    /// Fails only if the timer thread cannot be spawned; the caller treats
    /// that as non-fatal and serves connections without timestamp records.
    pub fn start(log: Arc<SharedLog>, interval: Duration) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("timestamp-timer".into())
            .spawn(move || run_timer(&log, interval, &thread_stop))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Tears the timer down: no further firings are scheduled, and the timer
    /// thread is joined.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("timestamp timer thread panicked");
            }
        }
    }
}

impl Drop for TimestampTimer {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_timer(log: &SharedLog, interval: Duration, stop: &AtomicBool) {
    let mut next_fire = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next_fire {
            thread::sleep(TEARDOWN_POLL_INTERVAL.min(next_fire - now));
            continue;
        }
        next_fire += interval;
        tick(log);
    }
}

/// One firing: format a timestamp record and append it under the shared lock.
fn tick(log: &SharedLog) {
    let record = timestamp_record(OffsetDateTime::now_utc());
    match log.append(record.as_bytes()) {
        Ok(written) => debug!(bytes = written, "appended timestamp record"),
        Err(error) => warn!(%error, "failed to append timestamp record"),
    }
}
