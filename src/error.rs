//! Error types for linelogd.
//!
//! Only startup-fatal conditions surface as [`ServerError`]: a server that
//! cannot bind its port has nothing to serve.
//! Per-connection failures (a client read, a log write, a failed accept) are
//! transient by design: they are logged at the site and terminate at most one
//! worker, never the process.

use std::io;

use thiserror::Error;

/// Error type for server startup and teardown.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// The configured port.
        port: u16,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Other fatal I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for results with [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_port() {
        let err = ServerError::Bind {
            port: 9000,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let message = err.to_string();
        assert!(message.contains("9000"), "message was: {message}");
    }

    #[test]
    fn io_error_converts() {
        fn fails() -> Result<()> {
            Err(io::Error::other("boom"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(ServerError::Io(_))));
    }
}
