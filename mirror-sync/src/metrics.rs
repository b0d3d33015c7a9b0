//! Prometheus metrics for the mirror

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

lazy_static! {
    /// Notifications applied, by outcome
    pub static ref SYNC_APPLY_TOTAL: CounterVec = register_counter_vec!(
        "mirror_sync_apply_total",
        "Lifecycle notifications applied to the mirror",
        &["event", "outcome"]
    )
    .unwrap();

    /// Notifications that could not be applied
    pub static ref SYNC_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "mirror_sync_errors_total",
        "Lifecycle notifications that failed to apply"
    )
    .unwrap();

    /// Rows backfilled from the ledger, by outcome
    pub static ref RESYNC_TOTAL: CounterVec = register_counter_vec!(
        "mirror_resync_total",
        "Mirror rows backfilled from the ledger",
        &["outcome"]
    )
    .unwrap();

    /// Drafts created
    pub static ref DRAFTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "mirror_drafts_created_total",
        "Speculative drafts created"
    )
    .unwrap();

    /// Drafts joined to a ledger id
    pub static ref DRAFTS_CONFIRMED_TOTAL: IntCounter = register_int_counter!(
        "mirror_drafts_confirmed_total",
        "Drafts joined to a ledger registration"
    )
    .unwrap();
}
