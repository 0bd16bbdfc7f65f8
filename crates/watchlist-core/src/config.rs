//! Configuration for watchlist-core
//!
//! Timing and behavior settings for the mutation coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on each remote call, in milliseconds.
    ///
    /// `None` waits forever, so a hung call keeps its item locked until the
    /// process is torn down.
    pub remote_timeout_ms: Option<u64>,
    /// Share one in-flight find-or-create call between concurrent
    /// materializations of the same catalog reference
    pub coalesce_materialize: bool,
    /// Buffered events per subscriber before the slowest one starts lagging
    pub event_capacity: usize,
    /// Background refetch after a successful mutation
    pub resync: ResyncConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: None,
            coalesce_materialize: false,
            event_capacity: 64,
            resync: ResyncConfig::default(),
        }
    }
}

/// Background resync configuration
///
/// The delay only dodges store read-after-write lag; it is not a
/// correctness mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    pub enabled: bool,
    pub delay_ms: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resync_delay(&self) -> Duration {
        Duration::from_millis(self.resync.delay_ms)
    }

    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_timeout_ms == Some(0) {
            return Err(ConfigError::OutOfRange(
                "remote_timeout_ms must be positive when set".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::OutOfRange(
                "event_capacity must be positive".to_string(),
            ));
        }

        // Anything slower than this is indistinguishable from a lost resync.
        if self.resync.delay_ms > 60_000 {
            return Err(ConfigError::OutOfRange(
                "resync.delay_ms must be at most 60000".to_string(),
            ));
        }

        Ok(())
    }
}
