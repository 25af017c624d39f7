//! Linelogd daemon entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use linelogd::{install_signal_handlers, Server, ServerConfig, ShutdownFlag};

#[derive(Parser, Debug)]
#[command(name = "linelogd", version, about = "Append-only line log served over TCP")]
struct Cli {
    /// Detach from the terminal and run as a daemon
    #[arg(short = 'd', long = "daemon", action = ArgAction::SetTrue)]
    daemon: bool,

    /// TCP port to listen on
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Path of the shared log file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Seconds between timestamp records
    #[arg(long = "timestamp-interval", value_name = "SECS")]
    timestamp_interval: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbosity: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownFlag::new();
    if let Err(error) = install_signal_handlers(&shutdown) {
        error!(%error, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    // Bind before daemonizing so startup errors reach the invoking shell.
    let server = match Server::bind(&config, shutdown) {
        Ok(server) => server,
        Err(error) => {
            error!(%error, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    if config.daemonize {
        if let Err(error) = daemonize::Daemonize::new().start() {
            error!(%error, "failed to daemonize");
            return ExitCode::FAILURE;
        }
    }

    match server.run() {
        Ok(()) => {
            info!("exited cleanly");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves configuration with precedence: CLI > environment > defaults.
fn resolve_config(cli: &Cli) -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default()
        .apply_env()
        .map_err(|e| e.to_string())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(path) = &cli.log_file {
        config.log_path = path.clone();
    }
    if let Some(secs) = cli.timestamp_interval {
        if secs == 0 {
            return Err("--timestamp-interval must be at least one second".into());
        }
        config.timestamp_interval = Duration::from_secs(secs);
    }
    config.daemonize = cli.daemon;

    Ok(config)
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("linelogd={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
