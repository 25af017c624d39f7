//! Server lifecycle: listener/acceptor, workers, and the drain sequence.
//!
//! # Architecture
//!
//! ```text
//! Server (main thread)
//! │
//! ├── Acceptor loop (stops when the shutdown flag is set)
//! │     ├── spawns one Worker thread per connection
//! │     └── housekeeping: reap finished workers, register the newborn
//! │
//! ├── Workers (receive → append → replay; tracked by WorkerRegistry)
//! │
//! └── TimestampTimer (independent producer on the same append lock)
//! ```
//!
//! Shutdown sequence, in order and best-effort (no step skipped on earlier
//! errors): stop accepting → drain all workers → tear down the timer →
//! remove the log file.

pub mod registry;
pub mod worker;

pub use registry::WorkerRegistry;
pub use worker::{handle_session, Session, SessionOutcome};

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::log::SharedLog;
use crate::shutdown::ShutdownFlag;
use crate::timer::TimestampTimer;

/// Listen backlog for the accepting socket.
const LISTEN_BACKLOG: i32 = 5;

/// How often the nonblocking accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The listening server, bound but not yet serving.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    log: Arc<SharedLog>,
    shutdown: ShutdownFlag,
    registry: WorkerRegistry,
    timestamp_interval: Duration,
}

impl Server {
    /// Binds the listening socket and assembles the shared resources.
    ///
    /// Binding is dual-stack where the platform allows it (an IPv6 socket
    /// with `IPV6_V6ONLY` cleared), falling back to IPv4. Failure to bind is
    /// startup-fatal.
    pub fn bind(config: &ServerConfig, shutdown: ShutdownFlag) -> Result<Self> {
        let listener = bind_listener(config.port).map_err(|source| ServerError::Bind {
            port: config.port,
            source,
        })?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        info!(addr = %local_addr, "socket bound");

        Ok(Self {
            listener,
            local_addr,
            log: Arc::new(SharedLog::new(config.log_path.clone())),
            shutdown,
            registry: WorkerRegistry::new(),
            timestamp_interval: config.timestamp_interval,
        })
    }

    /// Returns the bound address (useful when the port was configured as 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle to the shared shutdown flag.
    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Serves until shutdown is requested, then drains and tears down.
    ///
    /// Blocks the calling thread. Returns once the full shutdown sequence
    /// has run: all workers joined, timer torn down, log file removed.
    pub fn run(mut self) -> Result<()> {
        // Timer arming failure is non-fatal: serve without timestamps.
        let timer = match TimestampTimer::start(Arc::clone(&self.log), self.timestamp_interval) {
            Ok(timer) => Some(timer),
            Err(error) => {
                warn!(%error, "failed to arm timestamp timer");
                None
            }
        };

        info!(addr = %self.local_addr, "listening");
        self.accept_loop();
        info!("caught shutdown request, draining workers");

        let drained = self.registry.drain_all();
        info!(drained, "all workers joined");

        if let Some(timer) = timer {
            timer.shutdown();
        }
        if let Err(error) = self.log.remove() {
            warn!(%error, path = %self.log.path().display(), "failed to remove log file");
        }
        Ok(())
    }

    /// Accepts connections until the shutdown flag is set.
    ///
    /// Accept failures are transient: logged, never fatal. The listener is
    /// nonblocking so the flag stays observable even with no inbound
    /// traffic.
    fn accept_loop(&mut self) {
        while !self.shutdown.is_requested() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) => {
                    warn!(%error, "failed to accept connection");
                }
            }
        }
    }

    /// Spawns a worker for one accepted connection, then does one
    /// housekeeping pass over the registry.
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) {
        info!(%peer, "accepted connection");

        // The listener is nonblocking; the worker wants blocking reads.
        if let Err(error) = stream.set_nonblocking(false) {
            warn!(%peer, %error, "failed to configure connection, dropping it");
            return;
        }

        let session = Session::new(stream, peer);
        let log = Arc::clone(&self.log);
        let shutdown = self.shutdown.clone();

        let spawned = thread::Builder::new()
            .name(format!("worker-{peer}"))
            .spawn(move || handle_session(session, &log, &shutdown));

        match spawned {
            Ok(handle) => {
                self.registry.reap_finished();
                self.registry.register(handle);
            }
            Err(error) => {
                // Session drops here, closing the socket; keep accepting.
                warn!(%peer, %error, "failed to spawn worker");
            }
        }
    }
}

/// Builds the listening socket: dual-stack IPv6 when available, IPv4
/// otherwise, with address reuse enabled and a nonblocking accept queue.
fn bind_listener(port: u16) -> io::Result<TcpListener> {
    let listener = match bind_dual_stack(port) {
        Ok(listener) => listener,
        Err(v6_err) => bind_ipv4(port).map_err(|_| v6_err)?,
    };
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn bind_dual_stack(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    configure_reuse(&socket)?;
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

fn bind_ipv4(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    configure_reuse(&socket)?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

fn configure_reuse(socket: &Socket) -> io::Result<()> {
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    Ok(())
}
