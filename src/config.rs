//! Pool configuration parameters
//!
//! All tunable parameters for the connection engine.  Values come from
//! [`PoolConfig::default`] or from a JSON document supplied by the owning
//! application.

use std::time::Duration;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

/// Hard upper bound on simultaneous links a single pool will manage.
pub const MAX_CONNECTIONS_LIMIT: usize = 32;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of simultaneously connected devices
    pub max_connections: usize,
    /// Connect timeout used when the caller passes a zero timeout (milliseconds)
    pub default_connect_timeout_ms: u64,
    /// Name given to the callback delivery thread
    pub dispatcher_thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 7,
            default_connect_timeout_ms: 10_000,
            dispatcher_thread_name: "gatt-dispatch".into(),
        }
    }
}

impl PoolConfig {
    /// Parse and validate a JSON configuration document.  Missing fields
    /// take their default values.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing pool config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_connections > 0, "max_connections must be at least 1");
        ensure!(
            self.max_connections <= MAX_CONNECTIONS_LIMIT,
            "max_connections {} exceeds limit {}",
            self.max_connections,
            MAX_CONNECTIONS_LIMIT
        );
        ensure!(
            self.default_connect_timeout_ms > 0,
            "default_connect_timeout_ms must be positive"
        );
        ensure!(
            !self.dispatcher_thread_name.is_empty(),
            "dispatcher_thread_name must not be empty"
        );
        Ok(())
    }

    pub fn default_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.default_connect_timeout_ms)
    }
}
