//! Demo configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one demo run.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Directory holding the durable store files
    pub data_dir: PathBuf,

    /// Number of simulated contexts started up front
    pub contexts: usize,

    /// How long a new instance waits for peers
    pub init_timeout: Duration,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            contexts: 3,
            init_timeout: Duration::from_millis(500),
            log_level: "info".to_string(),
        }
    }
}

impl DemoConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CHANNEL_STATE_DATA_DIR`: Durable store directory (default: ./data)
    /// - `CHANNEL_STATE_CONTEXTS`: Simulated contexts (default: 3, at least 1)
    /// - `CHANNEL_STATE_INIT_TIMEOUT_MS`: Peer wait in milliseconds (default: 500)
    /// - `CHANNEL_STATE_LOG_LEVEL`: Log level (default: info)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            data_dir: lookup("CHANNEL_STATE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),

            contexts: lookup("CHANNEL_STATE_CONTEXTS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.contexts, |n: usize| n.max(1)),

            init_timeout: lookup("CHANNEL_STATE_INIT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.init_timeout, Duration::from_millis),

            log_level: lookup("CHANNEL_STATE_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}
