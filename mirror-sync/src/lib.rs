//! Mirror Synchronizer
//!
//! Keeps a fast, queryable off-ledger replica of the lifecycle ledger.
//!
//! # Architecture
//!
//! ```text
//! Ledger ──publish──▶ NotificationLog ──feed──▶ Subscriber ──▶ Synchronizer ──▶ MirrorStore
//!                                                                   ▲                │
//!                                        resync(id) ◀── LedgerSource│                ▼
//!                                                                               MirrorReader
//! ```
//!
//! - One consumer loop applies notifications one at a time and commits the
//!   offset only after each is applied or skipped
//! - Per-id lock stripes serialize row updates against backfills
//! - Drafts live in their own keyspace and join a ledger id on registration

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod advisory;
pub mod clock;
pub mod config;
pub mod drafts;
pub mod error;
pub mod metrics;
pub mod model;
pub mod reader;
pub mod store;
pub mod sync;

// Re-exports
pub use advisory::{Advisor, RiskAssessment, RiskLevel, TextGenerator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MirrorConfig;
pub use drafts::DraftReconciler;
pub use error::{Result, SyncError};
pub use model::{ApplyOutcome, AssetRecord, DraftRecord};
pub use reader::MirrorReader;
pub use store::{MemoryMirrorStore, MirrorStore, RocksMirrorStore};
pub use sync::{LedgerSource, ResyncReport, Synchronizer};
