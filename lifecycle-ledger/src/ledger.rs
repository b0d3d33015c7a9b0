//! Main ledger orchestration layer
//!
//! Ties together storage, the lifecycle state machine and the writer actor
//! into the high-level transition API.
//!
//! # Example
//!
//! ```no_run
//! use lifecycle_ledger::{Address, AssetType, Config, Ledger};
//! use notification_bus::NotificationLog;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lifecycle_ledger::Result<()> {
//!     let config = Config {
//!         regulator: "0xRegulator".to_string(),
//!         ..Config::default()
//!     };
//!     let regulator = config.regulator_address()?;
//!     let ledger = Ledger::open(config, Arc::new(NotificationLog::new())).await?;
//!
//!     let issuer = Address::new("0xissuer");
//!     ledger.add_issuer(&regulator, &issuer).await?;
//!     let receipt = ledger.register(&issuer, "QmHash", AssetType::Bond).await?;
//!     ledger.verify(&regulator, receipt.asset_id).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{notification_for, spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    roles::RoleRegistry,
    state_machine::LifecycleState,
    types::{Address, Asset, AssetEvent, AssetId, AssetType, Role, Transition, TransitionReceipt},
    Config, Error, Result, Storage,
};
use notification_bus::{NotificationLog, Publisher};
use std::sync::Arc;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for all operations
    handle: LedgerHandle,

    /// Log that receives a notification per committed record
    notifications: Arc<NotificationLog>,

    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration, publishing onto `notifications`
    ///
    /// State is restored from RocksDB. Records the log has not seen yet are
    /// republished so log offsets keep matching ledger sequences.
    pub async fn open(config: Config, notifications: Arc<NotificationLog>) -> Result<Self> {
        let regulator = config.regulator_address()?;
        let storage = Arc::new(Storage::open(&config)?);

        let roles = match storage.load_roles()? {
            Some(roles) if roles.regulator() != &regulator => {
                return Err(Error::Config(format!(
                    "Data dir belongs to regulator {}, configured {}",
                    roles.regulator(),
                    regulator
                )));
            }
            Some(roles) => roles,
            None => {
                let roles = RoleRegistry::new(regulator);
                storage.put_roles(&roles)?;
                roles
            }
        };

        let last_sequence = storage.last_sequence()?;
        let state = LifecycleState::restore(roles, storage.load_assets()?, last_sequence);

        let publisher = Publisher::new(notifications.clone());
        let replayed = Self::replay(&storage, &publisher, last_sequence)?;

        let metrics = Metrics::new()?;
        metrics.update_totals(state.assets().count(), last_sequence);

        tracing::info!(
            service = %config.service_name,
            assets = state.assets().count(),
            last_sequence,
            replayed,
            "Ledger opened"
        );

        let handle = spawn_ledger_actor(
            state,
            storage,
            publisher,
            metrics.clone(),
            config.mailbox_capacity,
        );

        Ok(Self {
            handle,
            notifications,
            metrics,
            config,
        })
    }

    /// Publish persisted records the notification log is missing
    fn replay(storage: &Storage, publisher: &Publisher, last_sequence: u64) -> Result<usize> {
        let head = publisher.log().head();
        if head > last_sequence {
            return Err(Error::Config(format!(
                "Notification log at offset {} is ahead of ledger sequence {}",
                head, last_sequence
            )));
        }

        let records = storage.records_after(head)?;
        for record in &records {
            publisher.publish(notification_for(record)?);
        }
        Ok(records.len())
    }

    /// Register a new asset owned by `caller` (ISSUER)
    pub async fn register(
        &self,
        caller: &Address,
        data_hash: &str,
        asset_type: AssetType,
    ) -> Result<TransitionReceipt> {
        self.handle
            .register(caller.clone(), data_hash.to_string(), asset_type)
            .await
    }

    /// REGISTERED → VERIFIED (REGULATOR)
    pub async fn verify(&self, caller: &Address, asset_id: AssetId) -> Result<TransitionReceipt> {
        self.transition(caller, asset_id, Transition::Verify).await
    }

    /// VERIFIED → TOKENIZED (owning ISSUER)
    pub async fn tokenize(&self, caller: &Address, asset_id: AssetId) -> Result<TransitionReceipt> {
        self.transition(caller, asset_id, Transition::Tokenize).await
    }

    /// TOKENIZED or FROZEN → ACTIVE (REGULATOR)
    pub async fn activate(&self, caller: &Address, asset_id: AssetId) -> Result<TransitionReceipt> {
        self.transition(caller, asset_id, Transition::Activate).await
    }

    /// ACTIVE → FROZEN (REGULATOR)
    pub async fn freeze(&self, caller: &Address, asset_id: AssetId) -> Result<TransitionReceipt> {
        self.transition(caller, asset_id, Transition::Freeze).await
    }

    /// ACTIVE → REDEEMED (owning ISSUER)
    pub async fn redeem(&self, caller: &Address, asset_id: AssetId) -> Result<TransitionReceipt> {
        self.transition(caller, asset_id, Transition::Redeem).await
    }

    /// Apply any status transition
    pub async fn transition(
        &self,
        caller: &Address,
        asset_id: AssetId,
        transition: Transition,
    ) -> Result<TransitionReceipt> {
        self.handle
            .transition(caller.clone(), asset_id, transition)
            .await
    }

    /// Grant ISSUER to `member`; returns false if already an issuer
    pub async fn add_issuer(&self, caller: &Address, member: &Address) -> Result<bool> {
        self.handle
            .set_issuer(caller.clone(), member.clone(), true)
            .await
    }

    /// Revoke ISSUER from `member`; returns false if not an issuer
    pub async fn remove_issuer(&self, caller: &Address, member: &Address) -> Result<bool> {
        self.handle
            .set_issuer(caller.clone(), member.clone(), false)
            .await
    }

    /// Whether `address` holds `role`
    pub async fn has_role(&self, role: Role, address: &Address) -> Result<bool> {
        self.handle.has_role(role, address.clone()).await
    }

    /// Role registry snapshot
    pub async fn roles(&self) -> Result<RoleRegistry> {
        self.handle.roles().await
    }

    /// Authoritative asset record
    pub async fn asset(&self, asset_id: AssetId) -> Result<Asset> {
        self.handle.get_asset(asset_id).await
    }

    /// All assets ordered by id
    pub async fn assets(&self) -> Result<Vec<Asset>> {
        self.handle.list_assets().await
    }

    /// Lifecycle events of one asset, oldest first
    pub async fn history(&self, asset_id: AssetId) -> Result<Vec<AssetEvent>> {
        self.handle.history(asset_id).await
    }

    /// Notification log fed by this ledger
    pub fn notifications(&self) -> &Arc<NotificationLog> {
        &self.notifications
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}
