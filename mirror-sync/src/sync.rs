//! Event-driven synchronizer
//!
//! Consumes lifecycle notifications and keeps the mirror eventually
//! consistent with the ledger.
//!
//! # Apply rules
//!
//! - `AssetRegistered` upserts the whole row (and joins a matching draft)
//! - Status events update `status` and `updated_at` only
//! - Status events for a missing row are a logged no-op
//! - Anything older than the row's `ledger_sequence` is ignored as stale
//! - A redelivery of the row's own sequence only moves `updated_at` forward
//!
//! Every read-modify-write of a row runs under the lock stripe of its id, so
//! a resync and a notification for the same asset never interleave. Draft
//! joins span ids, so they also take a single join lock (stripe first).

use crate::{
    clock::Clock,
    drafts::confirm_for_registration,
    error::{Result, SyncError},
    metrics::{DRAFTS_CONFIRMED_TOTAL, RESYNC_TOTAL, SYNC_APPLY_TOTAL, SYNC_ERRORS_TOTAL},
    model::{ApplyOutcome, AssetRecord},
    store::MirrorStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lifecycle_ledger::{Asset, AssetEvent, AssetEventKind, AssetId, AssetStatus, AssetType, Ledger};
use notification_bus::{
    partitioning::{HashPartitioning, PartitioningStrategy},
    Message, MessageHandler, MessageType, PartitionKey, Subscriber,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Read access to the authoritative ledger, used for backfills
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Authoritative asset
    async fn asset(&self, id: AssetId) -> lifecycle_ledger::Result<Asset>;

    /// Every authoritative asset
    async fn assets(&self) -> lifecycle_ledger::Result<Vec<Asset>>;
}

#[async_trait]
impl LedgerSource for Ledger {
    async fn asset(&self, id: AssetId) -> lifecycle_ledger::Result<Asset> {
        Ledger::asset(self, id).await
    }

    async fn assets(&self) -> lifecycle_ledger::Result<Vec<Asset>> {
        Ledger::assets(self).await
    }
}

/// Counts from a full backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Ledger assets examined
    pub examined: usize,
    /// Rows created
    pub inserted: usize,
    /// Rows replaced with ledger state
    pub overwritten: usize,
    /// Rows already current
    pub unchanged: usize,
    /// Rows ahead of the ledger snapshot
    pub stale: usize,
}

/// Applies lifecycle notifications to the mirror
pub struct Synchronizer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn LedgerSource>,
    stripes: Vec<Mutex<()>>,
    draft_join: Mutex<()>,
    partitioning: HashPartitioning,
}

impl<S> std::fmt::Debug for Synchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("stripes", &self.stripes.len())
            .finish_non_exhaustive()
    }
}

impl<S: MirrorStore> Synchronizer<S> {
    /// Create new synchronizer with `lock_stripes` per-id lock stripes
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn LedgerSource>,
        lock_stripes: u32,
    ) -> Self {
        let partitioning = HashPartitioning::new(lock_stripes);
        let stripes = (0..partitioning.num_partitions())
            .map(|_| Mutex::new(()))
            .collect();

        Self {
            store,
            clock,
            source,
            stripes,
            draft_join: Mutex::new(()),
            partitioning,
        }
    }

    /// The mirror store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock(&self, id: AssetId) -> MutexGuard<'_, ()> {
        let stripe = self.partitioning.partition(&PartitionKey::Entity(id.get()));
        self.stripes[stripe as usize].lock()
    }

    /// Apply one lifecycle event to the mirror
    pub fn apply_event(&self, event: &AssetEvent) -> Result<ApplyOutcome> {
        let _guard = self.lock(event.asset_id);
        let now = self.clock.now();
        let existing = self.store.get_asset(event.asset_id)?;

        let outcome = match &event.kind {
            AssetEventKind::Registered {
                asset_type,
                data_hash,
            } => self.apply_registration(event, existing, *asset_type, data_hash, now)?,
            _ => self.apply_status(event, existing, now)?,
        };

        SYNC_APPLY_TOTAL
            .with_label_values(&[event.kind.name(), outcome.label()])
            .inc();
        debug!(
            asset_id = %event.asset_id,
            sequence = event.sequence,
            event = event.kind.name(),
            outcome = outcome.label(),
            "Notification applied"
        );

        Ok(outcome)
    }

    fn apply_registration(
        &self,
        event: &AssetEvent,
        existing: Option<AssetRecord>,
        asset_type: AssetType,
        data_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome> {
        let outcome = match &existing {
            Some(row) if row.ledger_sequence > event.sequence => return Ok(ApplyOutcome::Stale),
            Some(row) if row.ledger_sequence == event.sequence => ApplyOutcome::Duplicate,
            Some(_) => ApplyOutcome::Overwrote,
            None => ApplyOutcome::Inserted,
        };

        let record = AssetRecord {
            id: event.asset_id,
            data_hash: data_hash.to_string(),
            asset_type,
            status: AssetStatus::Registered,
            owner: event.actor.clone(),
            updated_at: later(existing.as_ref(), now),
            ledger_sequence: event.sequence,
        };

        self.write_registration(&record, now)?;
        Ok(outcome)
    }

    fn apply_status(
        &self,
        event: &AssetEvent,
        existing: Option<AssetRecord>,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome> {
        let Some(mut row) = existing else {
            warn!(
                asset_id = %event.asset_id,
                event = event.kind.name(),
                sequence = event.sequence,
                "No mirror row for status event, 0 rows affected"
            );
            return Ok(ApplyOutcome::SkippedMissingRow);
        };

        if row.ledger_sequence > event.sequence {
            debug!(
                asset_id = %event.asset_id,
                row_sequence = row.ledger_sequence,
                sequence = event.sequence,
                "Stale notification ignored"
            );
            return Ok(ApplyOutcome::Stale);
        }

        let outcome = if row.ledger_sequence == event.sequence {
            ApplyOutcome::Duplicate
        } else {
            ApplyOutcome::Updated
        };

        row.status = event.resulting_status();
        row.updated_at = row.updated_at.max(now);
        row.ledger_sequence = event.sequence;
        self.store.put_asset(&row)?;

        Ok(outcome)
    }

    /// Row write for a registration, joining the matching draft if any
    fn write_registration(&self, record: &AssetRecord, now: DateTime<Utc>) -> Result<()> {
        // Two ids may match the same pending draft
        let _join = self.draft_join.lock();
        let draft = confirm_for_registration(
            self.store.as_ref(),
            record.id,
            &record.data_hash,
            record.asset_type,
            &record.owner,
            now,
        )?;

        self.store.put_registration(record, draft.as_ref())?;

        if let Some(draft) = draft {
            DRAFTS_CONFIRMED_TOTAL.inc();
            info!(draft_id = %draft.draft_id, asset_id = %record.id, "Draft joined to ledger id");
        }
        Ok(())
    }

    /// Backfill one row from the ledger
    pub async fn resync(&self, id: AssetId) -> Result<ApplyOutcome> {
        let asset = self.source.asset(id).await?;
        let outcome = self.backfill(&asset)?;

        RESYNC_TOTAL.with_label_values(&[outcome.label()]).inc();
        info!(asset_id = %id, outcome = outcome.label(), "Mirror row resynced");
        Ok(outcome)
    }

    /// Backfill every ledger asset missing from or behind the mirror
    pub async fn resync_all(&self) -> Result<ResyncReport> {
        let assets = self.source.assets().await?;
        let mut report = ResyncReport {
            examined: assets.len(),
            ..ResyncReport::default()
        };

        for asset in &assets {
            let outcome = self.backfill(asset)?;
            RESYNC_TOTAL.with_label_values(&[outcome.label()]).inc();
            match outcome {
                ApplyOutcome::Inserted => report.inserted += 1,
                ApplyOutcome::Overwrote => report.overwritten += 1,
                ApplyOutcome::Stale => report.stale += 1,
                _ => report.unchanged += 1,
            }
        }

        info!(?report, "Mirror resync complete");
        Ok(report)
    }

    fn backfill(&self, asset: &Asset) -> Result<ApplyOutcome> {
        let _guard = self.lock(asset.id);
        let now = self.clock.now();
        let existing = self.store.get_asset(asset.id)?;
        let candidate = AssetRecord::from_ledger(asset, later(existing.as_ref(), now));

        let outcome = match &existing {
            Some(row) if row.ledger_sequence > asset.last_sequence => ApplyOutcome::Stale,
            Some(row) if row.same_ledger_fields(&candidate) => ApplyOutcome::Duplicate,
            Some(_) => ApplyOutcome::Overwrote,
            None => ApplyOutcome::Inserted,
        };

        match outcome {
            ApplyOutcome::Inserted => self.write_registration(&candidate, now)?,
            ApplyOutcome::Overwrote => self.store.put_asset(&candidate)?,
            _ => {}
        }
        Ok(outcome)
    }
}

impl<S: MirrorStore + 'static> Synchronizer<S> {
    /// Start the consumer loop on its own task
    ///
    /// The loop resumes from the store's committed offset and stops when
    /// `shutdown` becomes true.
    pub fn spawn(
        self: Arc<Self>,
        subscriber: Subscriber,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<notification_bus::Result<u64>> {
        let offsets = self.store.clone();
        tokio::spawn(async move { subscriber.run(self, offsets, shutdown).await })
    }
}

#[async_trait]
impl<S: MirrorStore> MessageHandler for Synchronizer<S> {
    async fn handle(&self, message: Message) -> notification_bus::Result<()> {
        if message.message_type != MessageType::AssetLifecycle {
            return Ok(());
        }

        let offset = message.offset;
        let applied = message
            .decode::<AssetEvent>()
            .map_err(SyncError::from)
            .and_then(|event| self.apply_event(&event));

        match applied {
            Ok(_) => Ok(()),
            Err(e) => {
                SYNC_ERRORS_TOTAL.inc();
                error!(offset, error = %e, "Failed to apply notification");
                Err(SyncError::SyncApply {
                    offset,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
}

/// `now`, but never earlier than the row's current timestamp
fn later(existing: Option<&AssetRecord>, now: DateTime<Utc>) -> DateTime<Utc> {
    existing.map_or(now, |row| row.updated_at.max(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryMirrorStore;
    use chrono::{Duration, TimeZone};
    use lifecycle_ledger::Address;
    use parking_lot::RwLock;
    use std::collections::BTreeMap;

    /// Ledger stand-in holding a fixed asset table
    #[derive(Default)]
    struct FixedLedger {
        assets: RwLock<BTreeMap<AssetId, Asset>>,
    }

    #[async_trait]
    impl LedgerSource for FixedLedger {
        async fn asset(&self, id: AssetId) -> lifecycle_ledger::Result<Asset> {
            self.assets
                .read()
                .get(&id)
                .cloned()
                .ok_or(lifecycle_ledger::Error::AssetNotFound(id))
        }

        async fn assets(&self) -> lifecycle_ledger::Result<Vec<Asset>> {
            Ok(self.assets.read().values().cloned().collect())
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn issuer() -> Address {
        Address::new("0xissuer")
    }

    fn setup() -> (
        Synchronizer<MemoryMirrorStore>,
        Arc<ManualClock>,
        Arc<FixedLedger>,
    ) {
        let store = Arc::new(MemoryMirrorStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = Arc::new(FixedLedger::default());
        let sync = Synchronizer::new(store, clock.clone(), ledger.clone(), 8);
        (sync, clock, ledger)
    }

    fn event(sequence: u64, id: u64, kind: AssetEventKind) -> AssetEvent {
        AssetEvent {
            sequence,
            asset_id: AssetId::new(id),
            actor: issuer(),
            timestamp: start(),
            kind,
        }
    }

    fn registered(sequence: u64, id: u64) -> AssetEvent {
        event(
            sequence,
            id,
            AssetEventKind::Registered {
                asset_type: AssetType::Bond,
                data_hash: "QmTestHash123".to_string(),
            },
        )
    }

    fn row(sync: &Synchronizer<MemoryMirrorStore>, id: u64) -> AssetRecord {
        sync.store().get_asset(AssetId::new(id)).unwrap().unwrap()
    }

    #[test]
    fn test_registration_inserts_row() {
        let (sync, _, _) = setup();
        assert_eq!(sync.apply_event(&registered(1, 1)).unwrap(), ApplyOutcome::Inserted);

        let r = row(&sync, 1);
        assert_eq!(r.status, AssetStatus::Registered);
        assert_eq!(r.owner, issuer());
        assert_eq!(r.data_hash, "QmTestHash123");
        assert_eq!(r.updated_at, start());
    }

    #[test]
    fn test_duplicate_verified_moves_only_updated_at() {
        let (sync, clock, _) = setup();
        sync.apply_event(&registered(1, 1)).unwrap();

        let verified = event(2, 1, AssetEventKind::Verified);
        clock.advance(Duration::seconds(10));
        assert_eq!(sync.apply_event(&verified).unwrap(), ApplyOutcome::Updated);
        let first = row(&sync, 1);

        clock.advance(Duration::seconds(10));
        assert_eq!(sync.apply_event(&verified).unwrap(), ApplyOutcome::Duplicate);
        let second = row(&sync, 1);

        assert_eq!(second.status, AssetStatus::Verified);
        assert!(second.same_ledger_fields(&first));
        assert_eq!(second.updated_at, start() + Duration::seconds(20));
    }

    #[test]
    fn test_updated_at_never_moves_backward() {
        let (sync, clock, _) = setup();
        clock.advance(Duration::seconds(30));
        sync.apply_event(&registered(1, 1)).unwrap();

        clock.set(start());
        sync.apply_event(&event(2, 1, AssetEventKind::Verified)).unwrap();
        assert_eq!(row(&sync, 1).updated_at, start() + Duration::seconds(30));
    }

    #[test]
    fn test_status_event_without_row_is_noop() {
        let (sync, _, _) = setup();
        assert_eq!(
            sync.apply_event(&event(5, 3, AssetEventKind::Frozen)).unwrap(),
            ApplyOutcome::SkippedMissingRow
        );
        assert!(sync.store().list_assets().unwrap().is_empty());
    }

    #[test]
    fn test_stale_events_ignored() {
        let (sync, _, _) = setup();
        sync.apply_event(&registered(1, 1)).unwrap();
        sync.apply_event(&event(2, 1, AssetEventKind::Verified)).unwrap();
        sync.apply_event(&event(3, 1, AssetEventKind::Tokenized)).unwrap();

        assert_eq!(
            sync.apply_event(&event(2, 1, AssetEventKind::Verified)).unwrap(),
            ApplyOutcome::Stale
        );
        assert_eq!(sync.apply_event(&registered(1, 1)).unwrap(), ApplyOutcome::Stale);
        assert_eq!(row(&sync, 1).status, AssetStatus::Tokenized);
    }

    #[test]
    fn test_freeze_cycle_keeps_identity_fields() {
        let (sync, _, _) = setup();
        sync.apply_event(&registered(1, 1)).unwrap();
        let before = row(&sync, 1);

        sync.apply_event(&event(5, 1, AssetEventKind::Frozen)).unwrap();
        sync.apply_event(&event(6, 1, AssetEventKind::Activated)).unwrap();

        let after = row(&sync, 1);
        assert_eq!(after.status, AssetStatus::Active);
        assert_eq!(after.data_hash, before.data_hash);
        assert_eq!(after.asset_type, before.asset_type);
        assert_eq!(after.owner, before.owner);
    }

    #[tokio::test]
    async fn test_resync_backfills_missing_row() {
        let (sync, _, ledger) = setup();
        ledger.assets.write().insert(
            AssetId::new(4),
            Asset {
                id: AssetId::new(4),
                data_hash: "QmLate".to_string(),
                asset_type: AssetType::Equity,
                status: AssetStatus::Active,
                owner: issuer(),
                registered_at: start(),
                updated_at: start(),
                last_sequence: 9,
            },
        );

        // Missed registration: the status event alone is a no-op
        sync.apply_event(&event(9, 4, AssetEventKind::Activated)).unwrap();
        assert!(sync.store().get_asset(AssetId::new(4)).unwrap().is_none());

        assert_eq!(sync.resync(AssetId::new(4)).await.unwrap(), ApplyOutcome::Inserted);
        assert_eq!(row(&sync, 4).status, AssetStatus::Active);
        assert_eq!(sync.resync(AssetId::new(4)).await.unwrap(), ApplyOutcome::Duplicate);

        let report = sync.resync_all().await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.unchanged, 1);

        assert!(matches!(
            sync.resync(AssetId::new(99)).await,
            Err(SyncError::Ledger(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_rejects_garbage_payload() {
        let (sync, _, _) = setup();
        let message = Message::new(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(1),
            serde_json::json!({"unexpected": true}),
        );
        assert!(sync.handle(message).await.is_err());

        let other = Message::new(
            MessageType::SystemEvent,
            PartitionKey::Broadcast,
            serde_json::json!({}),
        );
        assert!(sync.handle(other).await.is_ok());
    }

    #[test]
    fn test_concurrent_registrations_join_distinct_drafts() {
        let (sync, _, _) = setup();
        let clock = Arc::new(ManualClock::new(start()));
        let drafts = crate::drafts::DraftReconciler::new(sync.store().clone(), clock);
        let tokens: Vec<_> = (0..4)
            .map(|_| drafts.create_draft("QmTestHash123", AssetType::Bond, &issuer()).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for id in 1..=4u64 {
                let sync = &sync;
                scope.spawn(move || sync.apply_event(&registered(id, id)).unwrap());
            }
        });

        let mut joined: Vec<_> = tokens
            .iter()
            .map(|token| drafts.get(*token).unwrap().confirmed_id.unwrap().get())
            .collect();
        joined.sort_unstable();
        assert_eq!(joined, vec![1, 2, 3, 4]);
    }
}
