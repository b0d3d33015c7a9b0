//! Core types for the lifecycle ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode on disk, JSON on the bus)
//! - A closed transition table: every edge of the lifecycle graph is listed
//!   in [`Transition`], nothing else is reachable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger address of a participant (issuer, regulator, owner)
///
/// Hex account addresses are case-insensitive, so every address is stored
/// trimmed and lowercased; equality is then plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Address(String);

impl Address {
    /// Create new (normalized) address
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_ascii_lowercase())
    }

    /// Normalize external input, rejecting blank addresses
    pub fn parse(address: &str) -> crate::Result<Self> {
        let parsed = Self::new(address);
        if parsed.is_empty() {
            return Err(crate::Error::InvalidInput("address must not be empty".to_string()));
        }
        Ok(parsed)
    }

    /// Whether the address is blank
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger-assigned asset identifier (auto-increment from 1)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetId(u64);

impl AssetId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Big-endian key bytes (sorts numerically in RocksDB)
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset classification, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssetType {
    /// Real estate
    RealEstate = 0,
    /// Bond
    Bond = 1,
    /// Art
    Art = 2,
    /// Equity
    Equity = 3,
}

impl AssetType {
    /// All asset types
    pub const ALL: [AssetType; 4] = [
        AssetType::RealEstate,
        AssetType::Bond,
        AssetType::Art,
        AssetType::Equity,
    ];

    /// Numeric code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Parse from numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            AssetType::RealEstate => "REAL_ESTATE",
            AssetType::Bond => "BOND",
            AssetType::Art => "ART",
            AssetType::Equity => "EQUITY",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssetStatus {
    /// Initial state
    Registered = 0,
    /// Approved by the regulator
    Verified = 1,
    /// Tokenized by the issuer
    Tokenized = 2,
    /// Live
    Active = 3,
    /// Suspended by the regulator (reversible)
    Frozen = 4,
    /// Redeemed (terminal)
    Redeemed = 5,
}

impl AssetStatus {
    /// All statuses in code order
    pub const ALL: [AssetStatus; 6] = [
        AssetStatus::Registered,
        AssetStatus::Verified,
        AssetStatus::Tokenized,
        AssetStatus::Active,
        AssetStatus::Frozen,
        AssetStatus::Redeemed,
    ];

    /// Numeric code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Parse from numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            AssetStatus::Registered => "REGISTERED",
            AssetStatus::Verified => "VERIFIED",
            AssetStatus::Tokenized => "TOKENIZED",
            AssetStatus::Active => "ACTIVE",
            AssetStatus::Frozen => "FROZEN",
            AssetStatus::Redeemed => "REDEEMED",
        }
    }

    /// No transition leaves this status
    pub fn is_terminal(&self) -> bool {
        Transition::ALL.iter().all(|t| !t.from_states().contains(self))
    }

    /// Whether some transition leads from `self` to `next`
    pub fn can_transition_to(&self, next: AssetStatus) -> bool {
        Transition::ALL
            .iter()
            .any(|t| t.target() == next && t.from_states().contains(self))
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role gating lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Registers, tokenizes and redeems assets
    Issuer,
    /// Verifies, activates and freezes assets; administers issuers
    Regulator,
}

impl Role {
    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Role::Issuer => "ISSUER",
            Role::Regulator => "REGULATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle transition on an existing asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// REGISTERED → VERIFIED
    Verify,
    /// VERIFIED → TOKENIZED
    Tokenize,
    /// TOKENIZED | FROZEN → ACTIVE
    Activate,
    /// ACTIVE → FROZEN
    Freeze,
    /// ACTIVE → REDEEMED
    Redeem,
}

impl Transition {
    /// Every transition
    pub const ALL: [Transition; 5] = [
        Transition::Verify,
        Transition::Tokenize,
        Transition::Activate,
        Transition::Freeze,
        Transition::Redeem,
    ];

    /// Role the caller must hold
    pub fn required_role(&self) -> Role {
        match self {
            Transition::Verify | Transition::Activate | Transition::Freeze => Role::Regulator,
            Transition::Tokenize | Transition::Redeem => Role::Issuer,
        }
    }

    /// Whether the caller must also be the asset owner
    pub fn requires_ownership(&self) -> bool {
        matches!(self, Transition::Tokenize | Transition::Redeem)
    }

    /// Statuses this transition may start from
    pub fn from_states(&self) -> &'static [AssetStatus] {
        match self {
            Transition::Verify => &[AssetStatus::Registered],
            Transition::Tokenize => &[AssetStatus::Verified],
            Transition::Activate => &[AssetStatus::Tokenized, AssetStatus::Frozen],
            Transition::Freeze => &[AssetStatus::Active],
            Transition::Redeem => &[AssetStatus::Active],
        }
    }

    /// Status after the transition
    pub fn target(&self) -> AssetStatus {
        match self {
            Transition::Verify => AssetStatus::Verified,
            Transition::Tokenize => AssetStatus::Tokenized,
            Transition::Activate => AssetStatus::Active,
            Transition::Freeze => AssetStatus::Frozen,
            Transition::Redeem => AssetStatus::Redeemed,
        }
    }

    /// Event emitted on success
    pub fn event_kind(&self) -> AssetEventKind {
        match self {
            Transition::Verify => AssetEventKind::Verified,
            Transition::Tokenize => AssetEventKind::Tokenized,
            Transition::Activate => AssetEventKind::Activated,
            Transition::Freeze => AssetEventKind::Frozen,
            Transition::Redeem => AssetEventKind::Redeemed,
        }
    }

    /// Operation name (metrics label)
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Verify => "verify",
            Transition::Tokenize => "tokenize",
            Transition::Activate => "activate",
            Transition::Freeze => "freeze",
            Transition::Redeem => "redeem",
        }
    }
}

/// Authoritative asset record held by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Ledger-assigned id
    pub id: AssetId,

    /// Off-ledger metadata pointer
    pub data_hash: String,

    /// Classification
    pub asset_type: AssetType,

    /// Current lifecycle status
    pub status: AssetStatus,

    /// Controlling party
    pub owner: Address,

    /// Registration time
    pub registered_at: DateTime<Utc>,

    /// Last mutation time (non-decreasing)
    pub updated_at: DateTime<Utc>,

    /// Sequence of the last event applied to this asset
    pub last_sequence: u64,
}

/// Event payload per transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetEventKind {
    /// Asset registered by an issuer
    Registered {
        /// Classification
        asset_type: AssetType,
        /// Metadata pointer
        data_hash: String,
    },
    /// Verified by the regulator
    Verified,
    /// Tokenized by the owner
    Tokenized,
    /// Activated (or unfrozen) by the regulator
    Activated,
    /// Frozen by the regulator
    Frozen,
    /// Redeemed by the owner
    Redeemed,
}

impl AssetEventKind {
    /// Status the asset holds after this event
    pub fn resulting_status(&self) -> AssetStatus {
        match self {
            AssetEventKind::Registered { .. } => AssetStatus::Registered,
            AssetEventKind::Verified => AssetStatus::Verified,
            AssetEventKind::Tokenized => AssetStatus::Tokenized,
            AssetEventKind::Activated => AssetStatus::Active,
            AssetEventKind::Frozen => AssetStatus::Frozen,
            AssetEventKind::Redeemed => AssetStatus::Redeemed,
        }
    }

    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            AssetEventKind::Registered { .. } => "AssetRegistered",
            AssetEventKind::Verified => "AssetVerified",
            AssetEventKind::Tokenized => "AssetTokenized",
            AssetEventKind::Activated => "AssetActivated",
            AssetEventKind::Frozen => "AssetFrozen",
            AssetEventKind::Redeemed => "AssetRedeemed",
        }
    }
}

/// Lifecycle notification emitted on every applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEvent {
    /// Global ledger sequence (also the notification offset)
    pub sequence: u64,

    /// Asset this event belongs to
    pub asset_id: AssetId,

    /// Caller that performed the transition
    pub actor: Address,

    /// Ledger timestamp
    pub timestamp: DateTime<Utc>,

    /// What happened
    pub kind: AssetEventKind,
}

impl AssetEvent {
    /// Status after this event
    pub fn resulting_status(&self) -> AssetStatus {
        self.kind.resulting_status()
    }
}

/// Issuer membership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEvent {
    /// Global ledger sequence
    pub sequence: u64,

    /// Role affected
    pub role: Role,

    /// Member granted or revoked
    pub member: Address,

    /// Granted (true) or revoked (false)
    pub granted: bool,

    /// Regulator that made the change
    pub actor: Address,

    /// Ledger timestamp
    pub timestamp: DateTime<Utc>,
}

/// Entry in the append-only ledger log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRecord {
    /// Asset lifecycle event
    Asset(AssetEvent),
    /// Role membership event
    Role(RoleEvent),
}

impl LedgerRecord {
    /// Global sequence number
    pub fn sequence(&self) -> u64 {
        match self {
            LedgerRecord::Asset(e) => e.sequence,
            LedgerRecord::Role(e) => e.sequence,
        }
    }

    /// Asset id, for asset events
    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            LedgerRecord::Asset(e) => Some(e.asset_id),
            LedgerRecord::Role(_) => None,
        }
    }
}

/// Confirmation returned by a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReceipt {
    /// Asset affected
    pub asset_id: AssetId,

    /// Status after the operation
    pub status: AssetStatus,

    /// Ledger sequence of the emitted event
    pub sequence: u64,

    /// The emitted event
    pub event: AssetEvent,
}
