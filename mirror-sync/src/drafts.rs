//! Speculative drafts and their join to ledger registrations
//!
//! A draft lets a caller hold a reference to an asset before the ledger has
//! assigned it an id. Drafts live under their own random token and are never
//! written into the asset table. When an `AssetRegistered` notification
//! carrying the same content reference, type and owner arrives, the oldest
//! pending draft is stamped with the ledger id.

use crate::{
    clock::Clock,
    error::{Result, SyncError},
    metrics::DRAFTS_CREATED_TOTAL,
    model::DraftRecord,
    store::MirrorStore,
};
use chrono::{DateTime, Utc};
use lifecycle_ledger::{Address, AssetId, AssetStatus, AssetType};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Creates and looks up drafts
pub struct DraftReconciler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> std::fmt::Debug for DraftReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftReconciler").finish_non_exhaustive()
    }
}

impl<S: MirrorStore> DraftReconciler<S> {
    /// Create new reconciler
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Insert a REGISTERED placeholder and return its token
    pub fn create_draft(&self, data_hash: &str, asset_type: AssetType, owner: &Address) -> Result<Uuid> {
        let data_hash = data_hash.trim();
        if data_hash.is_empty() {
            return Err(SyncError::InvalidInput("data hash must not be empty".to_string()));
        }
        if owner.is_empty() {
            return Err(SyncError::InvalidInput("owner must not be empty".to_string()));
        }

        let draft = DraftRecord {
            draft_id: Uuid::new_v4(),
            data_hash: data_hash.to_string(),
            asset_type,
            owner: owner.clone(),
            status: AssetStatus::Registered,
            created_at: self.clock.now(),
            confirmed_id: None,
            confirmed_at: None,
        };
        self.store.put_draft(&draft)?;
        DRAFTS_CREATED_TOTAL.inc();

        info!(draft_id = %draft.draft_id, data_hash = %draft.data_hash, owner = %owner, "Draft created");
        Ok(draft.draft_id)
    }

    /// Draft by token
    pub fn get(&self, draft_id: Uuid) -> Result<DraftRecord> {
        self.store
            .get_draft(draft_id)?
            .ok_or(SyncError::DraftNotFound(draft_id))
    }

    /// Drafts not yet joined to a ledger id
    pub fn pending(&self) -> Result<Vec<DraftRecord>> {
        Ok(self
            .store
            .list_drafts()?
            .into_iter()
            .filter(DraftRecord::is_pending)
            .collect())
    }

    /// All drafts, oldest first
    pub fn list(&self) -> Result<Vec<DraftRecord>> {
        self.store.list_drafts()
    }
}

/// Oldest pending draft matching a registration, stamped with the ledger id.
///
/// Returns `None` when no draft matches or the id was already joined.
pub(crate) fn confirm_for_registration<S: MirrorStore + ?Sized>(
    store: &S,
    asset_id: AssetId,
    data_hash: &str,
    asset_type: AssetType,
    owner: &Address,
    at: DateTime<Utc>,
) -> Result<Option<DraftRecord>> {
    let candidates = store.drafts_for_hash(data_hash)?;

    if candidates.iter().any(|d| d.confirmed_id == Some(asset_id)) {
        return Ok(None);
    }

    Ok(candidates
        .into_iter()
        .find(|d| d.matches(data_hash, asset_type, owner))
        .map(|mut draft| {
            draft.confirmed_id = Some(asset_id);
            draft.confirmed_at = Some(at);
            draft
        }))
}
