//! Actor-based concurrency for the ledger
//!
//! All mutations go through one task that owns the authoritative state:
//! - One logical writer serializes every transition into a single total order
//! - Each operation is planned, committed to RocksDB, applied, then published
//! - Callers talk to the actor through a bounded mailbox with backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   LifecycleState::plan_*()  → Commit                  │
//! │   Storage::commit()         (atomic WriteBatch)       │
//! │   LifecycleState::apply()                             │
//! │   Publisher::publish()      → NotificationLog         │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    metrics::Metrics,
    roles::RoleRegistry,
    state_machine::{Commit, LifecycleState},
    types::{
        Address, Asset, AssetEvent, AssetId, AssetType, LedgerRecord, Role, Transition,
        TransitionReceipt,
    },
    Error, Result, Storage,
};
use chrono::Utc;
use notification_bus::{Message, MessageType, PartitionKey, Publisher};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Register a new asset
    Register {
        caller: Address,
        data_hash: String,
        asset_type: AssetType,
        response: oneshot::Sender<Result<TransitionReceipt>>,
    },

    /// Apply a status transition
    Transition {
        caller: Address,
        asset_id: AssetId,
        transition: Transition,
        response: oneshot::Sender<Result<TransitionReceipt>>,
    },

    /// Grant ISSUER (true) or revoke it (false)
    SetIssuer {
        caller: Address,
        member: Address,
        granted: bool,
        response: oneshot::Sender<Result<bool>>,
    },

    /// Get asset by id
    GetAsset {
        asset_id: AssetId,
        response: oneshot::Sender<Result<Asset>>,
    },

    /// List all assets
    ListAssets {
        response: oneshot::Sender<Vec<Asset>>,
    },

    /// Lifecycle events of one asset
    History {
        asset_id: AssetId,
        response: oneshot::Sender<Result<Vec<AssetEvent>>>,
    },

    /// Role membership query
    HasRole {
        role: Role,
        address: Address,
        response: oneshot::Sender<bool>,
    },

    /// Snapshot of the role registry
    Roles {
        response: oneshot::Sender<RoleRegistry>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    state: LifecycleState,
    storage: Arc<Storage>,
    publisher: Publisher,
    metrics: Metrics,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl std::fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerActor")
            .field("last_sequence", &self.state.last_sequence())
            .finish()
    }
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        state: LifecycleState,
        storage: Arc<Storage>,
        publisher: Publisher,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            state,
            storage,
            publisher,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop until shutdown or every handle is dropped
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, LedgerMessage::Shutdown) {
                tracing::info!(
                    last_sequence = self.state.last_sequence(),
                    "Ledger actor shutting down"
                );
                break;
            }
            self.handle_message(msg);
        }
    }

    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Register {
                caller,
                data_hash,
                asset_type,
                response,
            } => {
                let result = self.register(&caller, &data_hash, asset_type);
                self.record_outcome("register", &result);
                let _ = response.send(result);
            }

            LedgerMessage::Transition {
                caller,
                asset_id,
                transition,
                response,
            } => {
                let result = self.transition(&caller, asset_id, transition);
                self.record_outcome(transition.name(), &result);
                let _ = response.send(result);
            }

            LedgerMessage::SetIssuer {
                caller,
                member,
                granted,
                response,
            } => {
                let result = self.set_issuer(&caller, &member, granted);
                let operation = if granted { "add_issuer" } else { "remove_issuer" };
                self.record_outcome(operation, &result);
                let _ = response.send(result);
            }

            LedgerMessage::GetAsset { asset_id, response } => {
                let result = self.state.asset(asset_id).cloned();
                let _ = response.send(result);
            }

            LedgerMessage::ListAssets { response } => {
                let _ = response.send(self.state.assets().cloned().collect());
            }

            LedgerMessage::History { asset_id, response } => {
                let result = self
                    .state
                    .asset(asset_id)
                    .and_then(|_| self.storage.asset_history(asset_id));
                let _ = response.send(result);
            }

            LedgerMessage::HasRole {
                role,
                address,
                response,
            } => {
                let _ = response.send(self.state.roles().has_role(role, &address));
            }

            LedgerMessage::Roles { response } => {
                let _ = response.send(self.state.roles().clone());
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn register(
        &mut self,
        caller: &Address,
        data_hash: &str,
        asset_type: AssetType,
    ) -> Result<TransitionReceipt> {
        let commit = self
            .state
            .plan_register(caller, data_hash, asset_type, Utc::now())?;
        self.persist(&commit)?;
        let receipt = receipt_for(commit)?;

        tracing::info!(
            asset_id = %receipt.asset_id,
            owner = %caller,
            asset_type = asset_type.name(),
            sequence = receipt.sequence,
            "Asset registered"
        );
        Ok(receipt)
    }

    fn transition(
        &mut self,
        caller: &Address,
        asset_id: AssetId,
        transition: Transition,
    ) -> Result<TransitionReceipt> {
        let commit = self
            .state
            .plan_transition(caller, asset_id, transition, Utc::now())?;
        self.persist(&commit)?;
        let receipt = receipt_for(commit)?;

        tracing::info!(
            asset_id = %asset_id,
            status = receipt.status.name(),
            actor = %caller,
            sequence = receipt.sequence,
            "Asset transitioned"
        );
        Ok(receipt)
    }

    fn set_issuer(&mut self, caller: &Address, member: &Address, granted: bool) -> Result<bool> {
        let now = Utc::now();
        let planned = if granted {
            self.state.plan_grant_issuer(caller, member, now)?
        } else {
            self.state.plan_revoke_issuer(caller, member, now)?
        };

        match planned {
            Some(commit) => {
                self.persist(&commit)?;
                tracing::info!(member = %member, granted, "Issuer membership changed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Commit to storage, install in memory, then notify subscribers
    fn persist(&mut self, commit: &Commit) -> Result<()> {
        // Encode first so a serialization failure leaves nothing behind
        let message = notification_for(&commit.record)?;

        let start = Instant::now();
        self.storage.commit(commit)?;
        self.metrics
            .record_commit_duration(start.elapsed().as_secs_f64());

        self.state.apply(commit);
        self.metrics.update_totals(
            self.state.assets().count(),
            self.state.last_sequence(),
        );

        let sequence = commit.record.sequence();
        let offset = self.publisher.publish(message);
        if offset != sequence {
            tracing::warn!(offset, sequence, "Notification offset diverged from ledger sequence");
        }

        Ok(())
    }

    fn record_outcome<T>(&self, operation: &str, result: &Result<T>) {
        match result {
            Ok(_) => self.metrics.record_operation(operation, "ok"),
            Err(e) => {
                let kind = e.kind();
                self.metrics.record_operation(operation, kind.label());
                tracing::warn!(operation, kind = kind.label(), error = %e, "Ledger operation rejected");
            }
        }
    }
}

/// Notification carrying a ledger record
pub fn notification_for(record: &LedgerRecord) -> Result<Message> {
    let message = match record {
        LedgerRecord::Asset(event) => Message::encode(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(event.asset_id.get()),
            event,
        )?
        .with_header("event", event.kind.name()),
        LedgerRecord::Role(event) => Message::encode(
            MessageType::RoleChange,
            PartitionKey::Named(event.role.name().to_string()),
            event,
        )?
        .with_header("event", if event.granted { "IssuerAdded" } else { "IssuerRemoved" }),
    };

    Ok(message.with_header("sequence", record.sequence().to_string()))
}

fn receipt_for(commit: Commit) -> Result<TransitionReceipt> {
    match (commit.record, commit.asset) {
        (LedgerRecord::Asset(event), Some(asset)) => Ok(TransitionReceipt {
            asset_id: asset.id,
            status: asset.status,
            sequence: event.sequence,
            event,
        }),
        (record, _) => Err(Error::Storage(format!(
            "Record {} carries no asset row",
            record.sequence()
        ))),
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Register a new asset
    pub async fn register(
        &self,
        caller: Address,
        data_hash: String,
        asset_type: AssetType,
    ) -> Result<TransitionReceipt> {
        self.request(|response| LedgerMessage::Register {
            caller,
            data_hash,
            asset_type,
            response,
        })
        .await?
    }

    /// Apply a status transition
    pub async fn transition(
        &self,
        caller: Address,
        asset_id: AssetId,
        transition: Transition,
    ) -> Result<TransitionReceipt> {
        self.request(|response| LedgerMessage::Transition {
            caller,
            asset_id,
            transition,
            response,
        })
        .await?
    }

    /// Grant or revoke ISSUER; `Ok(false)` when membership was already as requested
    pub async fn set_issuer(&self, caller: Address, member: Address, granted: bool) -> Result<bool> {
        self.request(|response| LedgerMessage::SetIssuer {
            caller,
            member,
            granted,
            response,
        })
        .await?
    }

    /// Get asset by id
    pub async fn get_asset(&self, asset_id: AssetId) -> Result<Asset> {
        self.request(|response| LedgerMessage::GetAsset { asset_id, response })
            .await?
    }

    /// List all assets
    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        self.request(|response| LedgerMessage::ListAssets { response })
            .await
    }

    /// Lifecycle events of one asset
    pub async fn history(&self, asset_id: AssetId) -> Result<Vec<AssetEvent>> {
        self.request(|response| LedgerMessage::History { asset_id, response })
            .await?
    }

    /// Role membership query
    pub async fn has_role(&self, role: Role, address: Address) -> Result<bool> {
        self.request(|response| LedgerMessage::HasRole {
            role,
            address,
            response,
        })
        .await
    }

    /// Snapshot of the role registry
    pub async fn roles(&self) -> Result<RoleRegistry> {
        self.request(|response| LedgerMessage::Roles { response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    state: LifecycleState,
    storage: Arc<Storage>,
    publisher: Publisher,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(state, storage, publisher, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
