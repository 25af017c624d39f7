//! Linelogd: an append-only line log served over TCP.
//!
//! # Overview
//!
//! Linelogd accepts any number of simultaneous client connections. Each client
//! submits exactly one newline-terminated record; the server appends it to a
//! single shared log file and streams the full current log back before closing
//! the connection. A background timer appends a timestamp record every fixed
//! interval through the same append lock, so from the log's perspective it is
//! just another producer.
//!
//! The difficulty is entirely in coordinating unbounded concurrent access to
//! the one shared log while supporting graceful, drain-based shutdown:
//!
//! - **Atomic appends**: appends are serialized through one process-wide lock
//!   and are never byte-interleaved, even under concurrent producers
//! - **Lock held only for the append**: replay streams without the lock, so a
//!   slow client cannot stall other appenders (the cost is live-tail replay
//!   with no snapshot isolation)
//! - **Cooperative cancellation**: every long-running loop polls a shared
//!   [`ShutdownFlag`]; no thread is ever forcibly terminated
//! - **Drain, don't kill**: shutdown stops the acceptor, then blocks until
//!   every in-flight worker reaches a terminal state by natural means
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration with environment overrides
//! - [`error`]: Error types
//! - [`shutdown`]: Shared shutdown flag and signal registration
//! - [`log`]: The shared append-only log resource and its lock discipline
//! - [`server`]: Listener/acceptor, per-connection workers, worker registry
//! - [`timer`]: Periodic timestamp producer

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod log;
pub mod server;
pub mod shutdown;
pub mod test_utils;
pub mod timer;

pub use config::{ConfigError, ServerConfig};
pub use error::{Result, ServerError};
pub use log::{AppendPermit, SharedLog};
pub use server::{Server, Session, SessionOutcome, WorkerRegistry};
pub use shutdown::{install_signal_handlers, ShutdownFlag};
pub use timer::{timestamp_record, TimestampTimer};
