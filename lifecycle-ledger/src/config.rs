//! Configuration for the lifecycle ledger

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Address holding the REGULATOR role (fixed for the lifetime of the data dir).
    /// No default: it must come from the file or `LIFECYCLE_REGULATOR`.
    pub regulator: String,

    /// Bounded actor mailbox size
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "lifecycle-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            regulator: String::new(),
            mailbox_capacity: 1000,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LIFECYCLE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(regulator) = std::env::var("LIFECYCLE_REGULATOR") {
            config.regulator = regulator;
        }

        if let Ok(capacity) = std::env::var("LIFECYCLE_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid LIFECYCLE_MAILBOX_CAPACITY: {}", capacity))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        self.regulator_address()?;
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// The configured regulator, normalized
    pub fn regulator_address(&self) -> crate::Result<Address> {
        Address::parse(&self.regulator)
            .map_err(|_| crate::Error::Config("regulator address must be set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "lifecycle-ledger");
        assert_eq!(config.mailbox_capacity, 1000);
        assert!(config.regulator.is_empty());
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        let configured = Config {
            regulator: " 0xAbC ".to_string(),
            ..Config::default()
        };
        assert!(configured.validate().is_ok());
        assert_eq!(configured.regulator_address().unwrap(), Address::new("0xabc"));
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(
            &path,
            "regulator = \"0xabc\"\n\n[rocksdb]\nmax_background_jobs = 8\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.regulator, "0xabc");
        assert_eq!(config.rocksdb.max_background_jobs, 8);
        assert_eq!(config.rocksdb.max_write_buffer_number, 3);
        assert_eq!(config.mailbox_capacity, 1000);
    }

    #[test]
    fn test_rejects_empty_regulator() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "regulator = \"  \"\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(crate::Error::Config(_))
        ));

        // Omitting it entirely is rejected too
        std::fs::write(&path, "mailbox_capacity = 10\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(crate::Error::Config(_))
        ));
    }
}
