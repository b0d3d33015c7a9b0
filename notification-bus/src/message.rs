//! Message envelope for the notification log

use crate::types::{MessageType, PartitionKey};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Delivery offset, assigned by the log on append (0 until then)
    pub offset: u64,

    /// Message ID (UUIDv7 for ordering)
    pub id: Uuid,

    /// Message type
    pub message_type: MessageType,

    /// Partition key for routing
    pub partition_key: PartitionKey,

    /// Payload (JSON)
    pub payload: serde_json::Value,

    /// Publish timestamp
    pub timestamp: DateTime<Utc>,

    /// Headers (metadata)
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
}

impl Message {
    /// Create new message
    pub fn new(
        message_type: MessageType,
        partition_key: PartitionKey,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            offset: 0,
            id: Uuid::now_v7(),
            message_type,
            partition_key,
            payload,
            timestamp: Utc::now(),
            headers: std::collections::HashMap::new(),
        }
    }

    /// Create a message from a serializable payload
    pub fn encode<T: Serialize>(
        message_type: MessageType,
        partition_key: PartitionKey,
        payload: &T,
    ) -> crate::Result<Self> {
        Ok(Self::new(
            message_type,
            partition_key,
            serde_json::to_value(payload)?,
        ))
    }

    /// Add header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Full subject (type prefix + partition segment)
    pub fn subject(&self) -> String {
        format!(
            "{}.{}",
            self.message_type.subject_prefix(),
            self.partition_key.to_subject_segment()
        )
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject() {
        let msg = Message::new(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(3),
            json!({"kind": "verified"}),
        );
        assert_eq!(msg.subject(), "lifecycle.asset.entity.3");
        assert_eq!(msg.offset, 0);
    }

    #[test]
    fn test_decode_typed_payload() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Payload {
            id: u64,
        }

        let msg = Message::encode(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(9),
            &Payload { id: 9 },
        )
        .unwrap()
        .with_header("source", "ledger");

        assert_eq!(msg.decode::<Payload>().unwrap(), Payload { id: 9 });
        assert_eq!(msg.headers.get("source").map(String::as_str), Some("ledger"));

        let bytes = msg.to_bytes().unwrap();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_mismatch_is_error() {
        let msg = Message::new(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(1),
            json!("not an object"),
        );
        assert!(msg.decode::<std::collections::HashMap<String, u64>>().is_err());
    }
}
