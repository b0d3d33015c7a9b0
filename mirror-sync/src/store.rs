//! Mirror store: keyed table of asset rows plus the draft keyspace
//!
//! # Column Families (RocksDB backend)
//!
//! - `assets` - Mirror rows (key: asset id, big-endian)
//! - `drafts` - Draft records (key: draft token)
//! - `draft_index` - Drafts by content reference (key: len || data hash || token)
//! - `offsets` - Committed consumer offsets (key: consumer name)

use crate::{
    config::MirrorConfig,
    error::{Result, SyncError},
    model::{AssetRecord, DraftRecord},
};
use dashmap::DashMap;
use lifecycle_ledger::AssetId;
use notification_bus::OffsetStore;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use uuid::Uuid;

/// Keyed record store behind the mirror
pub trait MirrorStore: OffsetStore + Send + Sync {
    /// Row by ledger id
    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>>;

    /// Insert or replace a row
    fn put_asset(&self, record: &AssetRecord) -> Result<()>;

    /// All rows ordered by id
    fn list_assets(&self) -> Result<Vec<AssetRecord>>;

    /// Draft by token
    fn get_draft(&self, draft_id: Uuid) -> Result<Option<DraftRecord>>;

    /// Insert or replace a draft
    fn put_draft(&self, draft: &DraftRecord) -> Result<()>;

    /// All drafts, oldest first
    fn list_drafts(&self) -> Result<Vec<DraftRecord>>;

    /// Drafts carrying `data_hash`, oldest first
    fn drafts_for_hash(&self, data_hash: &str) -> Result<Vec<DraftRecord>>;

    /// Write a registration row together with the draft it confirms
    fn put_registration(&self, record: &AssetRecord, confirmed: Option<&DraftRecord>) -> Result<()> {
        self.put_asset(record)?;
        if let Some(draft) = confirmed {
            self.put_draft(draft)?;
        }
        Ok(())
    }
}

fn sort_drafts(drafts: &mut [DraftRecord]) {
    drafts.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.draft_id.cmp(&b.draft_id))
    });
}

const CF_ASSETS: &str = "assets";
const CF_DRAFTS: &str = "drafts";
const CF_DRAFT_INDEX: &str = "draft_index";
const CF_OFFSETS: &str = "offsets";

/// RocksDB-backed mirror
pub struct RocksMirrorStore {
    db: DB,
}

impl std::fmt::Debug for RocksMirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksMirrorStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksMirrorStore {
    /// Open or create database
    pub fn open(config: &MirrorConfig) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ASSETS, Self::cf_options_lz4()),
            ColumnFamilyDescriptor::new(CF_DRAFTS, Self::cf_options_lz4()),
            ColumnFamilyDescriptor::new(CF_DRAFT_INDEX, Self::cf_options_lz4()),
            ColumnFamilyDescriptor::new(CF_OFFSETS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        tracing::info!(path = ?path, "Opened mirror RocksDB");

        Ok(Self { db })
    }

    fn cf_options_lz4() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SyncError::Storage(format!("Column family {} not found", name)))
    }

    fn hash_prefix(data_hash: &str) -> Vec<u8> {
        let bytes = data_hash.as_bytes();
        let mut key = Vec::with_capacity(4 + bytes.len() + 16);
        key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        key.extend_from_slice(bytes);
        key
    }

    fn index_key(draft: &DraftRecord) -> Vec<u8> {
        let mut key = Self::hash_prefix(&draft.data_hash);
        key.extend_from_slice(draft.draft_id.as_bytes());
        key
    }

    fn stage_draft(&self, batch: &mut WriteBatch, draft: &DraftRecord) -> Result<()> {
        batch.put_cf(
            self.cf_handle(CF_DRAFTS)?,
            draft.draft_id.as_bytes(),
            bincode::serialize(draft)?,
        );
        batch.put_cf(self.cf_handle(CF_DRAFT_INDEX)?, Self::index_key(draft), b"");
        Ok(())
    }
}

impl MirrorStore for RocksMirrorStore {
    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>> {
        let cf = self.cf_handle(CF_ASSETS)?;
        match self.db.get_cf(cf, id.to_key())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_asset(&self, record: &AssetRecord) -> Result<()> {
        let cf = self.cf_handle(CF_ASSETS)?;
        self.db
            .put_cf(cf, record.id.to_key(), bincode::serialize(record)?)?;
        Ok(())
    }

    fn list_assets(&self) -> Result<Vec<AssetRecord>> {
        let cf = self.cf_handle(CF_ASSETS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    fn get_draft(&self, draft_id: Uuid) -> Result<Option<DraftRecord>> {
        let cf = self.cf_handle(CF_DRAFTS)?;
        match self.db.get_cf(cf, draft_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_draft(&self, draft: &DraftRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_draft(&mut batch, draft)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn list_drafts(&self) -> Result<Vec<DraftRecord>> {
        let cf = self.cf_handle(CF_DRAFTS)?;
        let mut drafts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            drafts.push(bincode::deserialize(&value)?);
        }
        sort_drafts(&mut drafts);
        Ok(drafts)
    }

    fn drafts_for_hash(&self, data_hash: &str) -> Result<Vec<DraftRecord>> {
        let cf = self.cf_handle(CF_DRAFT_INDEX)?;
        let prefix = Self::hash_prefix(data_hash);

        let mut drafts = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let draft_id = Uuid::from_slice(&key[prefix.len()..])
                .map_err(|e| SyncError::Storage(format!("Malformed draft index key: {}", e)))?;
            if let Some(draft) = self.get_draft(draft_id)? {
                drafts.push(draft);
            }
        }
        sort_drafts(&mut drafts);
        Ok(drafts)
    }

    fn put_registration(&self, record: &AssetRecord, confirmed: Option<&DraftRecord>) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_ASSETS)?,
            record.id.to_key(),
            bincode::serialize(record)?,
        );
        if let Some(draft) = confirmed {
            self.stage_draft(&mut batch, draft)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

impl OffsetStore for RocksMirrorStore {
    fn load_offset(&self, consumer: &str) -> notification_bus::Result<u64> {
        let load = || -> Result<u64> {
            let cf = self.cf_handle(CF_OFFSETS)?;
            match self.db.get_cf(cf, consumer.as_bytes())? {
                Some(bytes) => {
                    let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                        SyncError::Storage(format!("Malformed offset for {}", consumer))
                    })?;
                    Ok(u64::from_be_bytes(raw))
                }
                None => Ok(0),
            }
        };
        load().map_err(|e| notification_bus::Error::OffsetStore(e.to_string()))
    }

    fn commit_offset(&self, consumer: &str, offset: u64) -> notification_bus::Result<()> {
        let commit = || -> Result<()> {
            let cf = self.cf_handle(CF_OFFSETS)?;
            self.db.put_cf(cf, consumer.as_bytes(), offset.to_be_bytes())?;
            Ok(())
        };
        commit().map_err(|e| notification_bus::Error::OffsetStore(e.to_string()))
    }
}

/// In-memory mirror
#[derive(Debug, Default)]
pub struct MemoryMirrorStore {
    assets: DashMap<AssetId, AssetRecord>,
    drafts: DashMap<Uuid, DraftRecord>,
    offsets: DashMap<String, u64>,
}

impl MemoryMirrorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl MirrorStore for MemoryMirrorStore {
    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>> {
        Ok(self.assets.get(&id).map(|r| r.value().clone()))
    }

    fn put_asset(&self, record: &AssetRecord) -> Result<()> {
        self.assets.insert(record.id, record.clone());
        Ok(())
    }

    fn list_assets(&self) -> Result<Vec<AssetRecord>> {
        let mut records: Vec<AssetRecord> =
            self.assets.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn get_draft(&self, draft_id: Uuid) -> Result<Option<DraftRecord>> {
        Ok(self.drafts.get(&draft_id).map(|d| d.value().clone()))
    }

    fn put_draft(&self, draft: &DraftRecord) -> Result<()> {
        self.drafts.insert(draft.draft_id, draft.clone());
        Ok(())
    }

    fn list_drafts(&self) -> Result<Vec<DraftRecord>> {
        let mut drafts: Vec<DraftRecord> =
            self.drafts.iter().map(|d| d.value().clone()).collect();
        sort_drafts(&mut drafts);
        Ok(drafts)
    }

    fn drafts_for_hash(&self, data_hash: &str) -> Result<Vec<DraftRecord>> {
        let mut drafts: Vec<DraftRecord> = self
            .drafts
            .iter()
            .filter(|d| d.data_hash == data_hash)
            .map(|d| d.value().clone())
            .collect();
        sort_drafts(&mut drafts);
        Ok(drafts)
    }
}

impl OffsetStore for MemoryMirrorStore {
    fn load_offset(&self, consumer: &str) -> notification_bus::Result<u64> {
        Ok(self.offsets.get(consumer).map(|o| *o).unwrap_or(0))
    }

    fn commit_offset(&self, consumer: &str, offset: u64) -> notification_bus::Result<()> {
        self.offsets.insert(consumer.to_string(), offset);
        Ok(())
    }
}
