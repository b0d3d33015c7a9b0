//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `events` - Append-only ledger log (key: sequence, big-endian)
//! - `assets` - Current asset rows (key: asset id, big-endian)
//! - `indices` - Asset history index (key: asset id || sequence)
//! - `roles` - Role registry snapshot (single key)

use crate::{
    config::Config,
    error::{Error, Result},
    roles::RoleRegistry,
    state_machine::Commit,
    types::{Asset, AssetEvent, AssetId, LedgerRecord},
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_ASSETS: &str = "assets";
const CF_INDICES: &str = "indices";
const CF_ROLES: &str = "roles";

const ROLES_KEY: &[u8] = b"registry";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_ASSETS, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_ROLES, Self::cf_options_rows()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        tracing::info!(path = ?path, "Opened ledger RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_rows() -> Options {
        let mut opts = Options::default();
        // Rows are read often, favour speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Persist a commit atomically (log entry, asset row, index, roles)
    pub fn commit(&self, commit: &Commit) -> Result<()> {
        let mut batch = WriteBatch::default();
        let sequence = commit.record.sequence();

        let cf_events = self.cf_handle(CF_EVENTS)?;
        batch.put_cf(cf_events, sequence.to_be_bytes(), bincode::serialize(&commit.record)?);

        if let Some(asset_id) = commit.record.asset_id() {
            let cf_indices = self.cf_handle(CF_INDICES)?;
            batch.put_cf(cf_indices, Self::index_key(asset_id, Some(sequence)), b"");
        }

        if let Some(asset) = &commit.asset {
            let cf_assets = self.cf_handle(CF_ASSETS)?;
            batch.put_cf(cf_assets, asset.id.to_key(), bincode::serialize(asset)?);
        }

        if let Some(roles) = &commit.roles {
            let cf_roles = self.cf_handle(CF_ROLES)?;
            batch.put_cf(cf_roles, ROLES_KEY, bincode::serialize(roles)?);
        }

        self.db.write(batch)?;

        tracing::debug!(sequence, "Ledger record committed");
        Ok(())
    }

    /// Persist the initial role registry
    pub fn put_roles(&self, roles: &RoleRegistry) -> Result<()> {
        let cf = self.cf_handle(CF_ROLES)?;
        self.db.put_cf(cf, ROLES_KEY, bincode::serialize(roles)?)?;
        Ok(())
    }

    /// Load the role registry, if one was stored
    pub fn load_roles(&self) -> Result<Option<RoleRegistry>> {
        let cf = self.cf_handle(CF_ROLES)?;
        match self.db.get_cf(cf, ROLES_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get asset row
    pub fn get_asset(&self, id: AssetId) -> Result<Asset> {
        let cf = self.cf_handle(CF_ASSETS)?;
        let value = self
            .db
            .get_cf(cf, id.to_key())?
            .ok_or(Error::AssetNotFound(id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All asset rows ordered by id
    pub fn load_assets(&self) -> Result<Vec<Asset>> {
        let cf = self.cf_handle(CF_ASSETS)?;
        let mut assets = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            assets.push(bincode::deserialize(&value)?);
        }
        Ok(assets)
    }

    /// Sequence of the newest log entry (0 if empty)
    pub fn last_sequence(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_EVENTS)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                Self::decode_u64(&key)
            }
            None => Ok(0),
        }
    }

    /// Log entries with sequence greater than `after`, in order
    pub fn records_after(&self, after: u64) -> Result<Vec<LedgerRecord>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = (after + 1).to_be_bytes();
        let mut records = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Log entry by sequence
    pub fn get_record(&self, sequence: u64) -> Result<Option<LedgerRecord>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        match self.db.get_cf(cf, sequence.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lifecycle events of one asset, oldest first (via index)
    pub fn asset_history(&self, id: AssetId) -> Result<Vec<AssetEvent>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key(id, None);

        let mut events = Vec::new();
        for item in self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let sequence = Self::decode_u64(&key[prefix.len()..])?;
            match self.get_record(sequence)? {
                Some(LedgerRecord::Asset(event)) => events.push(event),
                Some(LedgerRecord::Role(_)) | None => {
                    return Err(Error::Storage(format!(
                        "Index entry {} for asset {} has no asset event",
                        sequence, id
                    )))
                }
            }
        }

        Ok(events)
    }

    fn index_key(id: AssetId, sequence: Option<u64>) -> Vec<u8> {
        let mut key = id.to_key().to_vec();
        if let Some(seq) = sequence {
            key.extend_from_slice(&seq.to_be_bytes());
        }
        key
    }

    fn decode_u64(bytes: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Storage(format!("Malformed key of {} bytes", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::LifecycleState;
    use crate::types::{Address, AssetStatus, AssetType, Transition};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn regulator() -> Address {
        Address::new("0xregulator")
    }

    fn issuer() -> Address {
        Address::new("0xissuer")
    }

    /// Plan, persist and apply
    fn commit(storage: &Storage, state: &mut LifecycleState, commit: Commit) {
        storage.commit(&commit).unwrap();
        state.apply(&commit);
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_EVENTS).is_some());
        assert!(storage.db.cf_handle(CF_ASSETS).is_some());
        assert_eq!(storage.last_sequence().unwrap(), 0);
        assert!(storage.load_roles().unwrap().is_none());
    }

    #[test]
    fn test_commit_persists_log_row_and_index() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let mut state = LifecycleState::new(regulator());

        let grant = state
            .plan_grant_issuer(&regulator(), &issuer(), Utc::now())
            .unwrap()
            .unwrap();
        commit(&storage, &mut state, grant);

        let register = state
            .plan_register(&issuer(), "QmHash", AssetType::Art, Utc::now())
            .unwrap();
        commit(&storage, &mut state, register);

        let id = AssetId::new(1);
        let verify = state
            .plan_transition(&regulator(), id, Transition::Verify, Utc::now())
            .unwrap();
        commit(&storage, &mut state, verify);

        assert_eq!(storage.last_sequence().unwrap(), 3);
        assert_eq!(storage.get_asset(id).unwrap().status, AssetStatus::Verified);
        assert_eq!(storage.load_assets().unwrap().len(), 1);
        assert_eq!(storage.load_roles().unwrap().unwrap(), *state.roles());

        let history = storage.asset_history(id).unwrap();
        assert_eq!(
            history.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![2, 3]
        );

        let tail = storage.records_after(1).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence(), 2);
    }

    #[test]
    fn test_missing_asset() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(matches!(
            storage.get_asset(AssetId::new(7)),
            Err(Error::AssetNotFound(_))
        ));
        assert!(storage.asset_history(AssetId::new(7)).unwrap().is_empty());
    }
}
