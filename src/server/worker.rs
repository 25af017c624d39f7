//! Per-connection worker.
//!
//! One worker per accepted connection, running the session state machine:
//!
//! ```text
//! RECEIVING → LOCK_WAIT → APPENDING → REPLAYING → CLOSED
//!                 │
//!                 └──────→ EARLY_EXIT   (shutdown signaled while waiting)
//! ```
//!
//! The append lock is held only across the short APPENDING step, never during
//! the potentially slow replay send, so one slow client cannot stall other
//! appenders. The trade-off is that replay has no snapshot isolation: it
//! streams whatever is on disk at read time, which always includes the
//! worker's own record and may include records appended concurrently by
//! others.
//!
//! Every resource a worker touches (socket, log file handle, append permit)
//! is scoped, so all exit paths — read failure, append failure, early exit
//! from LOCK_WAIT — release everything they acquired.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};

use tracing::{debug, info, warn};

use crate::log::SharedLog;
use crate::shutdown::ShutdownFlag;

/// Ephemeral per-connection context: the socket and who is on the other end.
#[derive(Debug)]
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Session {
    /// Wraps an accepted connection.
    #[must_use]
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Returns the peer address.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Terminal state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Record appended and the full log replayed to the client.
    Completed {
        /// Bytes received from the client.
        received: usize,
        /// Bytes replayed back to the client.
        sent: u64,
    },
    /// Shutdown was signaled while waiting for the append lock; the worker
    /// exited without ever holding the lock or writing anything.
    ShutdownSignaled,
    /// The session ended early because an I/O step failed.
    Failed,
}

impl SessionOutcome {
    /// Returns `true` if the session ran to completion.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Returns `true` if the worker exited early because of shutdown.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownSignaled)
    }
}

/// Runs one session to a terminal state.
///
/// Receives exactly one newline-terminated record, appends it to the shared
/// log, and streams the full current log back to the client. Failures are
/// logged here and terminate only this session; the socket and any log
/// handles close on every path when their scopes end.
pub fn handle_session(
    mut session: Session,
    log: &SharedLog,
    shutdown: &ShutdownFlag,
) -> SessionOutcome {
    let peer = session.peer();
    let outcome = run_states(&mut session, log, shutdown);
    info!(%peer, ?outcome, "closed connection");
    outcome
}

fn run_states(session: &mut Session, log: &SharedLog, shutdown: &ShutdownFlag) -> SessionOutcome {
    let peer = session.peer();

    // RECEIVING: one delimiter-terminated record. A record cut short by EOF
    // is kept as received; EOF before any bytes is a failed receive.
    let mut record = Vec::new();
    let mut reader = BufReader::new(&session.stream);
    match reader.read_until(b'\n', &mut record) {
        Ok(0) => {
            warn!(%peer, "client closed connection before sending a record");
            return SessionOutcome::Failed;
        }
        Ok(received) => debug!(%peer, bytes = received, "received record"),
        Err(error) => {
            warn!(%peer, %error, "failed to receive record");
            return SessionOutcome::Failed;
        }
    }
    drop(reader);
    let received = record.len();

    // LOCK_WAIT → APPENDING: poll for the lock so shutdown stays observable;
    // the permit scope bounds exactly how long the lock is held.
    {
        let Some(permit) = log.acquire_append(shutdown) else {
            debug!(%peer, "shutdown signaled while waiting for the append lock");
            return SessionOutcome::ShutdownSignaled;
        };
        if let Err(error) = permit.append(&record) {
            warn!(%peer, %error, "failed to append record");
            return SessionOutcome::Failed;
        }
    }

    // REPLAYING: lock released; stream whatever is on disk right now.
    let sent = match log.read_into(&mut session.stream) {
        Ok(sent) => {
            debug!(%peer, bytes = sent, "replayed log to client");
            sent
        }
        Err(error) => {
            warn!(%peer, %error, "failed to replay log to client");
            return SessionOutcome::Failed;
        }
    };
    if let Err(error) = session.stream.flush() {
        warn!(%peer, %error, "failed to flush replay");
        return SessionOutcome::Failed;
    }

    SessionOutcome::Completed { received, sent }
}
