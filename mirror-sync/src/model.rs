//! Mirror records

use chrono::{DateTime, Utc};
use lifecycle_ledger::{Address, Asset, AssetId, AssetStatus, AssetType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Off-ledger replica of an asset, keyed by ledger id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Ledger id
    pub id: AssetId,

    /// Content reference
    pub data_hash: String,

    /// Classification
    pub asset_type: AssetType,

    /// Lifecycle status as last synchronized
    pub status: AssetStatus,

    /// Controlling party
    pub owner: Address,

    /// Time of the last local mutation
    pub updated_at: DateTime<Utc>,

    /// Ledger sequence of the last event applied
    pub ledger_sequence: u64,
}

impl AssetRecord {
    /// Row mirroring a ledger asset
    pub fn from_ledger(asset: &Asset, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: asset.id,
            data_hash: asset.data_hash.clone(),
            asset_type: asset.asset_type,
            status: asset.status,
            owner: asset.owner.clone(),
            updated_at,
            ledger_sequence: asset.last_sequence,
        }
    }

    /// Whether ledger-owned fields match (ignores `updated_at`)
    pub fn same_ledger_fields(&self, other: &AssetRecord) -> bool {
        self.id == other.id
            && self.data_hash == other.data_hash
            && self.asset_type == other.asset_type
            && self.status == other.status
            && self.owner == other.owner
            && self.ledger_sequence == other.ledger_sequence
    }
}

/// Speculative placeholder created before ledger confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    /// Locally generated correlation token (never a ledger id)
    pub draft_id: Uuid,

    /// Content reference the registration is expected to carry
    pub data_hash: String,

    /// Classification
    pub asset_type: AssetType,

    /// Intended owner
    pub owner: Address,

    /// Always REGISTERED for a draft
    pub status: AssetStatus,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Ledger id, once the matching registration was seen
    pub confirmed_id: Option<AssetId>,

    /// When the join happened
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl DraftRecord {
    /// Whether the draft is still waiting for its registration
    pub fn is_pending(&self) -> bool {
        self.confirmed_id.is_none()
    }

    /// Whether a registration with these attributes belongs to this draft
    pub fn matches(&self, data_hash: &str, asset_type: AssetType, owner: &Address) -> bool {
        self.is_pending()
            && self.data_hash == data_hash
            && self.asset_type == asset_type
            && &self.owner == owner
    }
}

/// Effect of applying one notification or backfill to a mirror row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Row created
    Inserted,
    /// Existing row overwritten by a registration or backfill
    Overwrote,
    /// Status advanced
    Updated,
    /// Already applied; only `updated_at` may have moved
    Duplicate,
    /// Older than what the row already reflects; nothing written
    Stale,
    /// Status event for a row that does not exist; nothing written
    SkippedMissingRow,
}

impl ApplyOutcome {
    /// Label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Inserted => "inserted",
            ApplyOutcome::Overwrote => "overwrote",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Duplicate => "duplicate",
            ApplyOutcome::Stale => "stale",
            ApplyOutcome::SkippedMissingRow => "skipped_missing_row",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DraftRecord {
        DraftRecord {
            draft_id: Uuid::new_v4(),
            data_hash: "QmDraft".to_string(),
            asset_type: AssetType::Art,
            owner: Address::new("0xowner"),
            status: AssetStatus::Registered,
            created_at: Utc::now(),
            confirmed_id: None,
            confirmed_at: None,
        }
    }

    #[test]
    fn test_draft_matching() {
        let mut d = draft();
        let owner = Address::new("0xowner");
        assert!(d.matches("QmDraft", AssetType::Art, &owner));
        assert!(!d.matches("QmDraft", AssetType::Bond, &owner));
        assert!(!d.matches("QmDraft", AssetType::Art, &Address::new("0xother")));

        d.confirmed_id = Some(AssetId::new(4));
        assert!(!d.matches("QmDraft", AssetType::Art, &owner));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = AssetRecord {
            id: AssetId::new(1),
            data_hash: "QmTestHash123".to_string(),
            asset_type: AssetType::Bond,
            status: AssetStatus::Redeemed,
            owner: Address::new("0xissuer"),
            updated_at: Utc::now(),
            ledger_sequence: 6,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["dataHash"], "QmTestHash123");
        assert!(json.get("updatedAt").is_some());
    }
}
