//! Configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacekeeperConfig {
    /// Retry and pacing behaviour.
    pub pacing: PacingConfig,
    /// Transport settings.
    pub http: TransportConfig,
}

/// Retry and pacing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay after every dispatch before the gate is released (ms).
    pub success_delay_ms: u64,
    /// Delay between failed attempts of one request (ms).
    pub failure_delay_ms: u64,
    /// Attempts per logical request, including the first.
    pub max_tries: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            success_delay_ms: 1000,
            failure_delay_ms: 10_000,
            max_tries: 3,
        }
    }
}

impl PacingConfig {
    /// Pacing delay as a [`Duration`].
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    /// Failure delay as a [`Duration`].
    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection timeout (seconds).
    pub connect_timeout_secs: u64,
    /// Whole-request timeout (seconds).
    pub request_timeout_secs: u64,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
    /// Keep a cookie store and replay cookies on later requests.
    pub cookies: bool,
    /// Base URL that relative request paths are resolved against.
    pub base_url: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: format!("pacekeeper/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
            cookies: true,
            base_url: None,
        }
    }
}

impl TransportConfig {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
