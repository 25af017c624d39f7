//! The shared append-only log resource.
//!
//! One file on durable storage, one process-wide append lock. Every producer
//! (workers and the timestamp timer alike) serializes its append through the
//! same [`SharedLog`], so appends are atomic with respect to each other and
//! are never byte-interleaved.
//!
//! Reads are deliberately unsynchronized: [`SharedLog::read_into`] may run
//! concurrently with other reads and with appends, and is only ever called
//! while *not* holding the append lock. A replay therefore sees whatever is
//! on disk at read time — a producer's own append happens-before its own
//! replay, but records appended concurrently by others may or may not appear.
//!
//! The file is created lazily on first append and removed only by the
//! shutdown sequence, never during normal operation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::shutdown::ShutdownFlag;

/// How often a waiting producer re-checks the lock and the shutdown flag.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The shared append-only log: a file path plus the append lock guarding it.
#[derive(Debug)]
pub struct SharedLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl SharedLog {
    /// Creates the log resource. The backing file is not touched until the
    /// first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, blocking until the lock is available.
    ///
    /// This is the uncancellable producer path used by the timestamp timer:
    /// a tick is short-lived and is allowed to finish even after shutdown is
    /// signaled, so it simply waits its turn.
    pub fn append(&self, record: &[u8]) -> io::Result<usize> {
        let guard = self.append_lock.lock();
        let written = self.append_locked(record)?;
        drop(guard);
        Ok(written)
    }

    /// Acquires the append lock with a poll loop that observes `shutdown`.
    ///
    /// Returns `None` if shutdown is requested before the lock is obtained;
    /// in that case nothing was written and the lock was never held. This is
    /// the worker's LOCK_WAIT: a worker parked here abandons the append and
    /// exits early instead of riding out a long queue during drain.
    pub fn acquire_append(&self, shutdown: &ShutdownFlag) -> Option<AppendPermit<'_>> {
        loop {
            if shutdown.is_requested() {
                return None;
            }
            if let Some(guard) = self.append_lock.try_lock() {
                return Some(AppendPermit { log: self, _guard: guard });
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Streams the full current log contents into `out`.
    ///
    /// Returns the number of bytes copied. An absent file reads as empty.
    /// Never call this while holding an [`AppendPermit`]; replay is defined
    /// to run outside the lock so a slow consumer cannot stall appenders.
    pub fn read_into(&self, out: &mut dyn Write) -> io::Result<u64> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        io::copy(&mut file, out)
    }

    /// Reads the full current log contents into a byte vector.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut buf)?;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        Ok(buf)
    }

    /// Removes the backing file. Absence is not an error.
    ///
    /// Only the shutdown sequence calls this, after every producer has
    /// stopped.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// The actual write. Caller must hold the append lock.
    fn append_locked(&self, record: &[u8]) -> io::Result<usize> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(record)?;
        file.flush()?;
        Ok(record.len())
    }
}

/// Exclusive permission to append, held for the duration of one append.
///
/// The permit owns the append lock; dropping it releases the lock on every
/// exit path, including error returns and early worker exits. Obtained from
/// [`SharedLog::acquire_append`].
#[must_use = "holding a permit without appending blocks every other producer"]
pub struct AppendPermit<'a> {
    log: &'a SharedLog,
    _guard: MutexGuard<'a, ()>,
}

impl AppendPermit<'_> {
    /// Appends one record under the held lock.
    ///
    /// Returns the number of bytes written.
    pub fn append(&self, record: &[u8]) -> io::Result<usize> {
        self.log.append_locked(record)
    }
}

impl std::fmt::Debug for AppendPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendPermit")
            .field("path", &self.log.path)
            .finish()
    }
}
