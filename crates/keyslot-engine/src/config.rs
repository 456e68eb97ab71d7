use keyslot_core::constants::{
    DEFAULT_POLL_INTERVAL_SECS, LINK_ERROR_LIMIT, LOCK_CONFIRM_TIMEOUT_SECS, SYNC_ERROR_CEILING,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconciliation engine settings shared by every lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between two polls of the same lock
    pub poll_interval_secs: u64,

    /// Consecutive disagreements before a slot is suspended
    pub sync_error_ceiling: u32,

    /// Seconds to wait for an alarm report confirming a lock state change
    pub lock_confirm_timeout_secs: u64,

    /// Consecutive failed polls tolerated before polling a lock stops
    pub link_error_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            sync_error_ceiling: SYNC_ERROR_CEILING,
            lock_confirm_timeout_secs: LOCK_CONFIRM_TIMEOUT_SECS,
            link_error_limit: LINK_ERROR_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn sync_error_ceiling(mut self, ceiling: u32) -> Self {
        self.sync_error_ceiling = ceiling;
        self
    }

    pub fn lock_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.lock_confirm_timeout_secs = timeout.as_secs();
        self
    }

    pub fn link_error_limit(mut self, limit: u32) -> Self {
        self.link_error_limit = limit;
        self
    }

    pub fn poll_interval_value(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn lock_confirm_timeout_value(&self) -> Duration {
        Duration::from_secs(self.lock_confirm_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval_value(), Duration::from_secs(30));
        assert_eq!(config.sync_error_ceiling, 5);
        assert_eq!(config.lock_confirm_timeout_value(), Duration::from_secs(30));
        assert_eq!(config.link_error_limit, 10);
    }

    #[test]
    fn test_engine_config_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"poll_interval_secs": 5}"#).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.sync_error_ceiling, 5);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::default()
            .poll_interval(Duration::from_millis(10))
            .sync_error_ceiling(3)
            .link_error_limit(2);
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.sync_error_ceiling, 3);
        assert_eq!(config.link_error_limit, 2);
    }
}
