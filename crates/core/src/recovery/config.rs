use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the background recovery loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Run the loop in the background. `sweep()` stays callable either way.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum number of orders examined per sweep.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    300 // 5 minutes
}

fn default_batch_limit() -> i64 {
    50
}

impl RecoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            batch_limit: default_batch_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecoveryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.batch_limit, 50);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: RecoveryConfig = toml::from_str("interval_secs = 60").unwrap();
        assert_eq!(config.interval_secs, 60);
        assert!(config.enabled);
        assert_eq!(config.batch_limit, 50);
    }
}
