//! Configuration for the mirror synchronizer

use lifecycle_ledger::config::RocksDBConfig;
use notification_bus::{MessageType, SubscriberConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Data directory for the mirror RocksDB
    pub data_dir: PathBuf,

    /// Durable consumer name (offset key)
    pub consumer_name: String,

    /// Bounded feed between the log and the consumer loop
    pub feed_capacity: usize,

    /// Notifications fetched from the log per read
    pub fetch_batch: usize,

    /// Number of per-id lock stripes
    pub lock_stripes: u32,

    /// Maximum parked dead letters
    pub dead_letter_capacity: usize,

    /// Release notification log entries once the mirror committed them
    pub truncate_log: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/mirror"),
            consumer_name: "mirror-sync".to_string(),
            feed_capacity: 1024,
            fetch_batch: 256,
            lock_stripes: 64,
            dead_letter_capacity: 10_000,
            truncate_log: true,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

impl MirrorConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MirrorConfig = toml::from_str(&content)
            .map_err(|e| crate::SyncError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = MirrorConfig::default();

        if let Ok(data_dir) = std::env::var("MIRROR_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(name) = std::env::var("MIRROR_CONSUMER_NAME") {
            config.consumer_name = name;
        }

        if let Ok(value) = std::env::var("MIRROR_FEED_CAPACITY") {
            config.feed_capacity = parse_var("MIRROR_FEED_CAPACITY", &value)?;
        }

        if let Ok(value) = std::env::var("MIRROR_LOCK_STRIPES") {
            config.lock_stripes = parse_var("MIRROR_LOCK_STRIPES", &value)?;
        }

        if let Ok(value) = std::env::var("MIRROR_TRUNCATE_LOG") {
            config.truncate_log = parse_var("MIRROR_TRUNCATE_LOG", &value)?;
        }

        Ok(config)
    }

    /// Subscriber settings for the lifecycle feed
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            durable_name: self.consumer_name.clone(),
            channel_capacity: self.feed_capacity,
            fetch_batch: self.fetch_batch,
            message_types: vec![MessageType::AssetLifecycle],
            truncate_log: self.truncate_log,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::SyncError::Config(format!("Invalid {}: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert_eq!(config.consumer_name, "mirror-sync");
        assert_eq!(config.lock_stripes, 64);
    }

    #[test]
    fn test_subscriber_config_filters_lifecycle() {
        let subscriber = MirrorConfig::default().subscriber_config();
        assert_eq!(subscriber.durable_name, "mirror-sync");
        assert_eq!(subscriber.message_types, vec![MessageType::AssetLifecycle]);
        assert!(subscriber.truncate_log);
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var::<u32>("X", "8").unwrap(), 8);
        assert!(parse_var::<u32>("X", "eight").is_err());
    }
}
