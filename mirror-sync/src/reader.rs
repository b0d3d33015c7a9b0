//! Read queries, served from the mirror only

use crate::{
    error::{Result, SyncError},
    model::AssetRecord,
    store::MirrorStore,
};
use lifecycle_ledger::AssetId;
use std::sync::Arc;

/// Query side of the mirror. May lag the ledger.
#[derive(Debug)]
pub struct MirrorReader<S> {
    store: Arc<S>,
}

impl<S> Clone for MirrorReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: MirrorStore> MirrorReader<S> {
    /// Create new reader
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every mirrored asset, ordered by id
    pub fn list(&self) -> Result<Vec<AssetRecord>> {
        self.store.list_assets()
    }

    /// One mirrored asset
    pub fn get(&self, id: AssetId) -> Result<AssetRecord> {
        self.store
            .get_asset(id)?
            .ok_or(SyncError::AssetNotFound(id))
    }
}
