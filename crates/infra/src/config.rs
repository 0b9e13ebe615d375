//! Runtime configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound on a single store commit as seen by the HTTP gateway.
    pub store_timeout: Duration,
    /// Per-session push queue depth.
    pub session_buffer: usize,
    pub replay_capacity: usize,
    pub keepalive: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store_timeout: Duration::from_millis(2_000),
            session_buffer: 256,
            replay_capacity: 1_024,
            keepalive: Duration::from_secs(15),
        }
    }
}

impl AppConfig {
    pub const BIND_ADDR: &'static str = "RESELLSYNC_BIND_ADDR";
    pub const STORE_TIMEOUT_MS: &'static str = "RESELLSYNC_STORE_TIMEOUT_MS";
    pub const SESSION_BUFFER: &'static str = "RESELLSYNC_SESSION_BUFFER";
    pub const REPLAY_CAPACITY: &'static str = "RESELLSYNC_REPLAY_CAPACITY";
    pub const KEEPALIVE_SECS: &'static str = "RESELLSYNC_KEEPALIVE_SECS";

    /// Load from the process environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match lookup(Self::BIND_ADDR) {
            Some(raw) => raw.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    var: Self::BIND_ADDR,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => defaults.bind_addr,
        };

        let store_timeout = parse_positive(&lookup, Self::STORE_TIMEOUT_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);
        let session_buffer = parse_positive(&lookup, Self::SESSION_BUFFER)?
            .map(to_usize)
            .unwrap_or(defaults.session_buffer);
        let replay_capacity = parse_positive(&lookup, Self::REPLAY_CAPACITY)?
            .map(to_usize)
            .unwrap_or(defaults.replay_capacity);
        let keepalive = parse_positive(&lookup, Self::KEEPALIVE_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.keepalive);

        Ok(Self {
            bind_addr,
            store_timeout,
            session_buffer,
            replay_capacity,
            keepalive,
        })
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Some(value))
}
