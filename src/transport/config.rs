//! Carrier defaults for transport operations

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub const READ_TIMEOUT_ENV: &str = "ADB_TRANSPORT_READ_TIMEOUT_MS";
pub const WRITE_TIMEOUT_ENV: &str = "ADB_TRANSPORT_WRITE_TIMEOUT_MS";
pub const CHANNEL_CAPACITY_ENV: &str = "ADB_TRANSPORT_CHANNEL_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Applied when a read is called with `Timeout::Unspecified` (`None` waits forever)
    pub read_timeout_ms: Option<u64>,
    /// Applied when a write is called with `Timeout::Unspecified` (`None` waits forever)
    pub write_timeout_ms: Option<u64>,
    /// Chunks a carrier may queue before writes start waiting
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            write_timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TransportConfig {
    /// Defaults overridden by any `ADB_TRANSPORT_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(READ_TIMEOUT_ENV) {
            config.read_timeout_ms = parse_timeout(READ_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(WRITE_TIMEOUT_ENV) {
            config.write_timeout_ms = parse_timeout(WRITE_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(CHANNEL_CAPACITY_ENV) {
            config.channel_capacity = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidCapacity {
                        key: CHANNEL_CAPACITY_ENV.to_string(),
                        value: raw,
                    });
                }
            };
        }
        log::debug!("Transport config: {config:?}");
        Ok(config)
    }
}

fn parse_timeout(key: &str, raw: &str) -> Result<Option<u64>, ConfigError> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("inf") {
        return Ok(None);
    }
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidTimeout {
            key: key.to_string(),
            value: raw.to_string(),
        })
}
