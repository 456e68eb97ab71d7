use anyhow::{Context, Result, bail};
use keyslot_core::LockConfig;
use keyslot_engine::EngineConfig;
use keyslot_storage::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Contents of the `--config` file.
///
/// ```json
/// {
///   "database": { "database_path": "data/keyslot.db" },
///   "engine": { "poll_interval_secs": 30 },
///   "notify_target": "mobile_app",
///   "locks": [
///     { "lock_id": "lock.front_door", "name": "Front Door", "manufacturer": "Kwikset" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Notification channel for locks that name none
    #[serde(default)]
    pub notify_target: Option<String>,

    #[serde(default)]
    pub locks: Vec<LockConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every lock and reject duplicate lock ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for lock in &self.locks {
            lock.validate()
                .with_context(|| format!("lock {}", lock.lock_id))?;
            if !seen.insert(&lock.lock_id) {
                bail!("lock {} is configured more than once", lock.lock_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "database": { "database_path": "data/keyslot.db", "max_connections": 2 },
        "engine": { "poll_interval_secs": 15 },
        "notify_target": "mobile_app",
        "locks": [
            { "lock_id": "lock.front_door", "name": "Front Door", "manufacturer": "Kwikset" },
            { "lock_id": "lock.garage", "notify_left_open": true, "open_duration_secs": 120 }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.database.database_path, "data/keyslot.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.engine.poll_interval_secs, 15);
        assert_eq!(config.engine.sync_error_ceiling, EngineConfig::default().sync_error_ceiling);
        assert_eq!(config.notify_target.as_deref(), Some("mobile_app"));
        assert_eq!(config.locks.len(), 2);
        assert_eq!(config.locks[0].manufacturer.as_deref(), Some("Kwikset"));
        assert!(config.locks[1].notify_left_open);
        assert_eq!(config.locks[1].open_duration_secs, 120);
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = AppConfig::parse("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_duplicate_lock_rejected() {
        let text = r#"{ "locks": [ { "lock_id": "lock.a" }, { "lock_id": "lock.a" } ] }"#;
        let err = AppConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_invalid_lock_rejected() {
        let text = r#"{ "locks": [ { "lock_id": "lock.a", "notify_left_open": true, "open_duration_secs": 0 } ] }"#;
        assert!(AppConfig::parse(text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.locks[0].lock_id.as_str(), "lock.front_door");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/keyslot.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
