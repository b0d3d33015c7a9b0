//! Asset Lifecycle Ledger
//!
//! Authoritative, append-only record of real-world assets moving through a
//! regulated lifecycle.
//!
//! # Architecture
//!
//! - **Role Gating**: every operation is authorized against an explicit role registry
//! - **Fixed Transition Graph**: `REGISTERED → VERIFIED → TOKENIZED → ACTIVE ⇄ FROZEN`, `ACTIVE → REDEEMED`
//! - **Single Writer**: one actor task applies all mutations in a total order
//! - **Notifications**: every committed record is published with its sequence as offset
//!
//! # Invariants
//!
//! - Asset ids are assigned from 1 and never reused
//! - Rejected operations leave no trace (all-or-nothing)
//! - `updated_at` never moves backward for an asset
//! - Replaying the log reproduces the same state

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod roles;
pub mod state_machine;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::Ledger;
pub use roles::RoleRegistry;
pub use storage::Storage;
pub use types::{
    Address, Asset, AssetEvent, AssetEventKind, AssetId, AssetStatus, AssetType, LedgerRecord,
    Role, RoleEvent, Transition, TransitionReceipt,
};
