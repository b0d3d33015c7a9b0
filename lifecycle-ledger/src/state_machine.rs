//! Lifecycle state machine
//!
//! Every operation is split into a pure *plan* step that validates the
//! request against the current state and builds a [`Commit`], and an
//! *apply* step that installs the commit. Nothing is mutated until the
//! commit has been persisted, so a rejected or failed operation leaves the
//! state untouched.
//!
//! Validation order for transitions: existence, role, ownership, status.

use crate::{
    error::{Error, Result},
    roles::RoleRegistry,
    types::{
        Address, Asset, AssetEvent, AssetEventKind, AssetId, AssetType, LedgerRecord, Role,
        RoleEvent, Transition,
    },
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Maximum accepted data hash length
pub const MAX_DATA_HASH_LEN: usize = 512;

/// A validated, not yet applied, ledger mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Log entry to append
    pub record: LedgerRecord,

    /// Asset row after the mutation
    pub asset: Option<Asset>,

    /// Role registry after the mutation
    pub roles: Option<RoleRegistry>,
}

/// In-memory authoritative state
#[derive(Debug, Clone)]
pub struct LifecycleState {
    assets: BTreeMap<AssetId, Asset>,
    roles: RoleRegistry,
    next_asset_id: u64,
    last_sequence: u64,
}

impl LifecycleState {
    /// Fresh state with a fixed regulator
    pub fn new(regulator: Address) -> Self {
        Self {
            assets: BTreeMap::new(),
            roles: RoleRegistry::new(regulator),
            next_asset_id: 1,
            last_sequence: 0,
        }
    }

    /// Rebuild from persisted rows
    pub fn restore(
        roles: RoleRegistry,
        assets: impl IntoIterator<Item = Asset>,
        last_sequence: u64,
    ) -> Self {
        let assets: BTreeMap<AssetId, Asset> =
            assets.into_iter().map(|a| (a.id, a)).collect();
        let next_asset_id = assets.keys().next_back().map(|id| id.get() + 1).unwrap_or(1);

        Self {
            assets,
            roles,
            next_asset_id,
            last_sequence,
        }
    }

    /// Role registry
    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    /// Asset by id
    pub fn asset(&self, id: AssetId) -> Result<&Asset> {
        self.assets.get(&id).ok_or(Error::AssetNotFound(id))
    }

    /// All assets ordered by id
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Sequence of the newest record
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Id the next registration will receive
    pub fn next_asset_id(&self) -> AssetId {
        AssetId::new(self.next_asset_id)
    }

    /// Validate a registration
    pub fn plan_register(
        &self,
        caller: &Address,
        data_hash: &str,
        asset_type: AssetType,
        now: DateTime<Utc>,
    ) -> Result<Commit> {
        self.roles.authorize(caller, Role::Issuer)?;

        let data_hash = data_hash.trim();
        if data_hash.is_empty() {
            return Err(Error::InvalidInput("data hash must not be empty".to_string()));
        }
        if data_hash.len() > MAX_DATA_HASH_LEN {
            return Err(Error::InvalidInput(format!(
                "data hash exceeds {} bytes",
                MAX_DATA_HASH_LEN
            )));
        }

        let id = self.next_asset_id();
        let sequence = self.last_sequence + 1;
        let kind = AssetEventKind::Registered {
            asset_type,
            data_hash: data_hash.to_string(),
        };

        let asset = Asset {
            id,
            data_hash: data_hash.to_string(),
            asset_type,
            status: kind.resulting_status(),
            owner: caller.clone(),
            registered_at: now,
            updated_at: now,
            last_sequence: sequence,
        };

        Ok(Commit {
            record: LedgerRecord::Asset(AssetEvent {
                sequence,
                asset_id: id,
                actor: caller.clone(),
                timestamp: now,
                kind,
            }),
            asset: Some(asset),
            roles: None,
        })
    }

    /// Validate a transition on an existing asset
    pub fn plan_transition(
        &self,
        caller: &Address,
        asset_id: AssetId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Commit> {
        let current = self.asset(asset_id)?;

        self.roles.authorize(caller, transition.required_role())?;

        if transition.requires_ownership() && &current.owner != caller {
            return Err(Error::NotOwner {
                caller: caller.clone(),
                asset_id,
                owner: current.owner.clone(),
            });
        }

        if !transition.from_states().contains(&current.status) {
            return Err(Error::InvalidTransition {
                asset_id,
                actual: current.status,
                expected: transition.from_states().to_vec(),
            });
        }

        let sequence = self.last_sequence + 1;
        let timestamp = now.max(current.updated_at);

        let mut asset = current.clone();
        asset.status = transition.target();
        asset.updated_at = timestamp;
        asset.last_sequence = sequence;

        Ok(Commit {
            record: LedgerRecord::Asset(AssetEvent {
                sequence,
                asset_id,
                actor: caller.clone(),
                timestamp,
                kind: transition.event_kind(),
            }),
            asset: Some(asset),
            roles: None,
        })
    }

    /// Validate an issuer grant (`None` if already an issuer)
    pub fn plan_grant_issuer(
        &self,
        caller: &Address,
        member: &Address,
        now: DateTime<Utc>,
    ) -> Result<Option<Commit>> {
        let Some(roles) = self.roles.with_issuer(caller, member)? else {
            return Ok(None);
        };
        Ok(Some(self.role_commit(caller, member, true, roles, now)))
    }

    /// Validate an issuer revocation (`None` if not an issuer)
    pub fn plan_revoke_issuer(
        &self,
        caller: &Address,
        member: &Address,
        now: DateTime<Utc>,
    ) -> Result<Option<Commit>> {
        let Some(roles) = self.roles.without_issuer(caller, member)? else {
            return Ok(None);
        };
        Ok(Some(self.role_commit(caller, member, false, roles, now)))
    }

    fn role_commit(
        &self,
        caller: &Address,
        member: &Address,
        granted: bool,
        roles: RoleRegistry,
        now: DateTime<Utc>,
    ) -> Commit {
        Commit {
            record: LedgerRecord::Role(RoleEvent {
                sequence: self.last_sequence + 1,
                role: Role::Issuer,
                member: member.clone(),
                granted,
                actor: caller.clone(),
                timestamp: now,
            }),
            asset: None,
            roles: Some(roles),
        }
    }

    /// Install a persisted commit
    pub fn apply(&mut self, commit: &Commit) {
        self.last_sequence = self.last_sequence.max(commit.record.sequence());

        if let Some(asset) = &commit.asset {
            self.next_asset_id = self.next_asset_id.max(asset.id.get() + 1);
            self.assets.insert(asset.id, asset.clone());
        }

        if let Some(roles) = &commit.roles {
            self.roles = roles.clone();
        }
    }
}
