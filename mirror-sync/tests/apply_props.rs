//! Property tests for notification apply
//!
//! - Redelivering any notification leaves the ledger fields of a row unchanged
//! - Replaying old notifications after the stream never regresses status

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lifecycle_ledger::{
    Address, Asset, AssetEvent, AssetEventKind, AssetId, AssetStatus, AssetType, Transition,
};
use mirror_sync::{
    ApplyOutcome, AssetRecord, LedgerSource, ManualClock, MemoryMirrorStore, MirrorStore,
    Synchronizer,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Ledger that knows nothing; apply never consults it
struct EmptyLedger;

#[async_trait]
impl LedgerSource for EmptyLedger {
    async fn asset(&self, id: AssetId) -> lifecycle_ledger::Result<Asset> {
        Err(lifecycle_ledger::Error::AssetNotFound(id))
    }

    async fn assets(&self) -> lifecycle_ledger::Result<Vec<Asset>> {
        Ok(Vec::new())
    }
}

fn synchronizer() -> Synchronizer<MemoryMirrorStore> {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    Synchronizer::new(
        Arc::new(MemoryMirrorStore::new()),
        clock,
        Arc::new(EmptyLedger),
        4,
    )
}

/// Valid event stream for asset 1: registration, then every requested
/// transition the current status allows
fn lifecycle_events(requested: &[Transition], gaps: &[u64]) -> Vec<AssetEvent> {
    let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let mut sequence = 1;
    let mut status = AssetStatus::Registered;
    let mut events = vec![AssetEvent {
        sequence,
        asset_id: AssetId::new(1),
        actor: Address::new("0xissuer"),
        timestamp,
        kind: AssetEventKind::Registered {
            asset_type: AssetType::Bond,
            data_hash: "QmProp".to_string(),
        },
    }];

    for (i, transition) in requested.iter().enumerate() {
        if !transition.from_states().contains(&status) {
            continue;
        }
        sequence += 1 + gaps.get(i).copied().unwrap_or(0);
        status = transition.target();
        events.push(AssetEvent {
            sequence,
            asset_id: AssetId::new(1),
            actor: Address::new("0xregulator"),
            timestamp,
            kind: transition.event_kind(),
        });
    }
    events
}

fn row(sync: &Synchronizer<MemoryMirrorStore>) -> AssetRecord {
    sync.store().get_asset(AssetId::new(1)).unwrap().unwrap()
}

fn transition_strategy() -> impl Strategy<Value = Transition> {
    prop::sample::select(Transition::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_redelivery_is_idempotent(
        requested in prop::collection::vec(transition_strategy(), 0..12),
        gaps in prop::collection::vec(0u64..3, 12),
        repeats in prop::collection::vec(1usize..4, 13),
    ) {
        let events = lifecycle_events(&requested, &gaps);

        let once = synchronizer();
        for event in &events {
            once.apply_event(event).unwrap();
        }

        let repeated = synchronizer();
        for (event, times) in events.iter().zip(repeats.iter().copied()) {
            for attempt in 0..times {
                let outcome = repeated.apply_event(event).unwrap();
                if attempt > 0 {
                    prop_assert_eq!(outcome, ApplyOutcome::Duplicate);
                }
            }
        }

        prop_assert!(row(&repeated).same_ledger_fields(&row(&once)));
    }

    #[test]
    fn prop_old_notifications_never_regress(
        requested in prop::collection::vec(transition_strategy(), 1..12),
        replay in prop::collection::vec(any::<prop::sample::Index>(), 1..8),
    ) {
        let events = lifecycle_events(&requested, &[]);
        let sync = synchronizer();
        for event in &events {
            sync.apply_event(event).unwrap();
        }
        let settled = row(&sync);
        let last = events.len() - 1;

        for index in replay {
            let i = index.index(events.len());
            let outcome = sync.apply_event(&events[i]).unwrap();
            let expected = if i == last { ApplyOutcome::Duplicate } else { ApplyOutcome::Stale };
            prop_assert_eq!(outcome, expected);
        }

        prop_assert!(row(&sync).same_ledger_fields(&settled));
    }
}
