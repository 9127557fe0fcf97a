//! Channel configuration.

use std::time::Duration;

use tandem_core::constants::DEFAULT_TIME_ZONE;
use tandem_core::error::{Result, TandemError};
use tandem_core::SystemClock;

/// Default time allowed for the identity exchange on a fresh connection.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the verified-connection queue.
pub const DEFAULT_MAX_PENDING_CONNS: usize = 16;

/// Settings shared by every channel a [`ChannelManager`](crate::ChannelManager) creates.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Log every message read from and written to a channel.
    pub read_write_logging: bool,
    /// Location used to timestamp outgoing messages.
    pub time_zone: String,
    /// Read deadline armed while the identity handshake runs.
    pub handshake_timeout: Duration,
    /// Capacity of the verified-connection queue of a session.
    pub max_pending_conns: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_write_logging: false,
            time_zone: DEFAULT_TIME_ZONE.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_pending_conns: DEFAULT_MAX_PENDING_CONNS,
        }
    }
}

impl ChannelConfig {
    /// Loads the configuration from the environment (and `.env`, if present).
    ///
    /// | variable | field |
    /// |---|---|
    /// | `TANDEM_RW_LOGGING` | `read_write_logging` (`true`/`1`) |
    /// | `TANDEM_TIME_ZONE` | `time_zone` |
    /// | `TANDEM_HANDSHAKE_TIMEOUT_SECS` | `handshake_timeout` |
    /// | `TANDEM_MAX_PENDING_CONNS` | `max_pending_conns` |
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            read_write_logging: lookup("TANDEM_RW_LOGGING")
                .map(|v| matches!(v.trim(), "true" | "1" | "yes"))
                .unwrap_or(defaults.read_write_logging),
            time_zone: lookup("TANDEM_TIME_ZONE").unwrap_or(defaults.time_zone),
            handshake_timeout: match lookup("TANDEM_HANDSHAKE_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(parse_number("TANDEM_HANDSHAKE_TIMEOUT_SECS", &v)?),
                None => defaults.handshake_timeout,
            },
            max_pending_conns: match lookup("TANDEM_MAX_PENDING_CONNS") {
                Some(v) => parse_number("TANDEM_MAX_PENDING_CONNS", &v)? as usize,
                None => defaults.max_pending_conns,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_conns == 0 {
            return Err(TandemError::ConfigError(
                "max pending connections must be at least 1".into(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(TandemError::ConfigError(
                "handshake timeout must be non-zero".into(),
            ));
        }
        SystemClock::with_zone(&self.time_zone)?;
        Ok(())
    }

    /// Enables message read/write logging.
    pub fn with_read_write_logging(mut self, enabled: bool) -> Self {
        self.read_write_logging = enabled;
        self
    }

    /// Sets the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the time zone for message timestamps.
    pub fn with_time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = zone.into();
        self
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| TandemError::ConfigError(format!("{} must be a number: {}", key, e)))
}
