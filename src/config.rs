//! Server configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `port` | 9000 |
//! | `log_path` | `/var/tmp/linelogd.data` |
//! | `timestamp_interval` | 10 seconds |
//! | `daemonize` | false |
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Command line** — flags parsed by the binary
//! 2. **Environment variables** — `LINELOGD_*` overrides applied by
//!    [`ServerConfig::apply_env`]
//! 3. **Defaults** — built-in defaults from [`ServerConfig::default()`]

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Environment variable name for the listening port.
pub const ENV_PORT: &str = "LINELOGD_PORT";
/// Environment variable name for the shared log file path.
pub const ENV_LOG_PATH: &str = "LINELOGD_LOG_PATH";
/// Environment variable name for the timestamp interval in seconds.
pub const ENV_TIMESTAMP_INTERVAL_SECS: &str = "LINELOGD_TIMESTAMP_INTERVAL_SECS";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9000;
/// Default shared log file path.
pub const DEFAULT_LOG_PATH: &str = "/var/tmp/linelogd.data";
/// Default interval between timestamp records.
pub const DEFAULT_TIMESTAMP_INTERVAL: Duration = Duration::from_secs(10);

/// Error produced when an environment override contains an unusable value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnvValue {
        /// The environment variable name.
        var: &'static str,
        /// The raw value found in the environment.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (dual-stack IPv4/IPv6).
    pub port: u16,
    /// Path of the shared append-only log file.
    pub log_path: PathBuf,
    /// Interval between timestamp records.
    pub timestamp_interval: Duration,
    /// Detach from the controlling terminal before serving.
    pub daemonize: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            timestamp_interval: DEFAULT_TIMESTAMP_INTERVAL,
            daemonize: false,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listening port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the shared log file path.
    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Sets the interval between timestamp records.
    #[must_use]
    pub fn with_timestamp_interval(mut self, interval: Duration) -> Self {
        self.timestamp_interval = interval;
        self
    }

    /// Applies `LINELOGD_*` environment variable overrides.
    ///
    /// Only variables that are set in the environment are applied. Returns an
    /// error if a variable is set but contains an unparseable value.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = read_env(ENV_PORT) {
            self.port = value
                .parse()
                .map_err(|e| invalid(ENV_PORT, &value, &format!("{e}")))?;
        }
        if let Some(value) = read_env(ENV_LOG_PATH) {
            self.log_path = PathBuf::from(value);
        }
        if let Some(value) = read_env(ENV_TIMESTAMP_INTERVAL_SECS) {
            let secs: u64 = value
                .parse()
                .map_err(|e| invalid(ENV_TIMESTAMP_INTERVAL_SECS, &value, &format!("{e}")))?;
            if secs == 0 {
                return Err(invalid(
                    ENV_TIMESTAMP_INTERVAL_SECS,
                    &value,
                    "interval must be at least one second",
                ));
            }
            self.timestamp_interval = Duration::from_secs(secs);
        }
        Ok(self)
    }
}

fn read_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnvValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{env_lock, init_test_logging};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn defaults() {
        init_test("config_defaults");
        let config = ServerConfig::default();
        crate::assert_with_log!(config.port == DEFAULT_PORT, "port", DEFAULT_PORT, config.port);
        crate::assert_with_log!(
            config.timestamp_interval == DEFAULT_TIMESTAMP_INTERVAL,
            "interval",
            DEFAULT_TIMESTAMP_INTERVAL,
            config.timestamp_interval
        );
        assert!(!config.daemonize);
        crate::test_complete!("config_defaults");
    }

    #[test]
    fn builder_setters() {
        init_test("config_builder_setters");
        let config = ServerConfig::new()
            .with_port(4242)
            .with_log_path("/tmp/other.data")
            .with_timestamp_interval(Duration::from_secs(1));
        assert_eq!(config.port, 4242);
        assert_eq!(config.log_path, PathBuf::from("/tmp/other.data"));
        assert_eq!(config.timestamp_interval, Duration::from_secs(1));
        crate::test_complete!("config_builder_setters");
    }

    #[test]
    fn env_overrides_apply() {
        init_test("config_env_overrides_apply");
        let _guard = env_lock();
        env::set_var(ENV_PORT, "4243");
        env::set_var(ENV_LOG_PATH, "/tmp/env.data");
        env::set_var(ENV_TIMESTAMP_INTERVAL_SECS, "3");

        let config = ServerConfig::default().apply_env().expect("apply_env");
        assert_eq!(config.port, 4243);
        assert_eq!(config.log_path, PathBuf::from("/tmp/env.data"));
        assert_eq!(config.timestamp_interval, Duration::from_secs(3));

        env::remove_var(ENV_PORT);
        env::remove_var(ENV_LOG_PATH);
        env::remove_var(ENV_TIMESTAMP_INTERVAL_SECS);
        crate::test_complete!("config_env_overrides_apply");
    }

    #[test]
    fn env_invalid_port_rejected() {
        init_test("config_env_invalid_port_rejected");
        let _guard = env_lock();
        env::set_var(ENV_PORT, "not-a-port");

        let result = ServerConfig::default().apply_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvValue { var: ENV_PORT, .. })
        ));

        env::remove_var(ENV_PORT);
        crate::test_complete!("config_env_invalid_port_rejected");
    }

    #[test]
    fn env_zero_interval_rejected() {
        init_test("config_env_zero_interval_rejected");
        let _guard = env_lock();
        env::set_var(ENV_TIMESTAMP_INTERVAL_SECS, "0");

        let result = ServerConfig::default().apply_env();
        assert!(result.is_err());

        env::remove_var(ENV_TIMESTAMP_INTERVAL_SECS);
        crate::test_complete!("config_env_zero_interval_rejected");
    }
}
