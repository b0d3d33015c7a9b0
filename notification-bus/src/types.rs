//! Type definitions for the notification bus

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Asset lifecycle transition emitted by the ledger
    AssetLifecycle,
    /// Issuer membership change emitted by the ledger
    RoleChange,
    /// System event (startup, replay markers)
    SystemEvent,
}

impl MessageType {
    /// Subject prefix for this message type
    pub fn subject_prefix(&self) -> &'static str {
        match self {
            MessageType::AssetLifecycle => "lifecycle.asset",
            MessageType::RoleChange => "lifecycle.role",
            MessageType::SystemEvent => "lifecycle.system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subject_prefix())
    }
}

/// Partition key for routing messages
///
/// Messages sharing a key are delivered in publish order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKey {
    /// Partition by ledger entity id
    Entity(u64),
    /// Partition by free-form key (addresses, correlation tokens)
    Named(String),
    /// Broadcast to all partitions
    Broadcast,
}

impl PartitionKey {
    /// Subject segment for this key
    pub fn to_subject_segment(&self) -> String {
        match self {
            PartitionKey::Entity(id) => format!("entity.{}", id),
            PartitionKey::Named(name) => format!("named.{}", sanitize_subject(name)),
            PartitionKey::Broadcast => "broadcast".to_string(),
        }
    }

    /// Compute partition number for load balancing and lock striping
    pub fn partition_number(&self, num_partitions: u32) -> u32 {
        let hash = match self {
            PartitionKey::Entity(id) => blake3::hash(&id.to_be_bytes()),
            PartitionKey::Named(name) => blake3::hash(name.as_bytes()),
            PartitionKey::Broadcast => return 0,
        };

        let hash_bytes = hash.as_bytes();
        let hash_u32 =
            u32::from_le_bytes([hash_bytes[0], hash_bytes[1], hash_bytes[2], hash_bytes[3]]);
        hash_u32 % num_partitions
    }
}

/// Sanitize string for use in a subject
fn sanitize_subject(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_subject() {
        assert_eq!(PartitionKey::Entity(42).to_subject_segment(), "entity.42");
        assert_eq!(
            PartitionKey::Named("0xAbC/1".to_string()).to_subject_segment(),
            "named.0xAbC_1"
        );
        assert_eq!(PartitionKey::Broadcast.to_subject_segment(), "broadcast");
    }

    #[test]
    fn test_partition_number_is_stable() {
        let key = PartitionKey::Entity(7);
        let p1 = key.partition_number(16);
        assert!(p1 < 16);
        assert_eq!(p1, key.partition_number(16));
        assert_eq!(PartitionKey::Broadcast.partition_number(16), 0);
    }

    #[test]
    fn test_sanitize_subject() {
        assert_eq!(sanitize_subject("QmHash/1"), "QmHash_1");
        assert_eq!(sanitize_subject("issuer-1"), "issuer-1");
    }
}
