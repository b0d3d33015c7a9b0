//! Dead-letter queue for notifications a handler failed to apply
//!
//! Failed notifications are skipped by the consumer (the offset still
//! advances) and parked here with the failure reason so they can be
//! inspected or reprocessed once the cause is fixed.

use crate::message::Message;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// DLQ entry with failure metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Entry ID
    pub id: Uuid,
    /// The notification that failed
    pub original_message: Message,
    /// Last failure reason
    pub failure_reason: String,
    /// Number of failed attempts
    pub retry_count: u32,
    /// First failure time
    pub first_failure_at: DateTime<Utc>,
    /// Last failure time
    pub last_failure_at: DateTime<Utc>,
}

/// In-memory bounded dead-letter queue
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DlqEntry>>,
    max_entries: usize,
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl DeadLetterQueue {
    /// Create a queue holding at most `max_entries`
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Park a failed message; repeated failures of the same message bump its retry count
    pub fn push(&self, message: Message, failure_reason: impl Into<String>) -> Uuid {
        let failure_reason = failure_reason.into();
        let now = Utc::now();
        let mut entries = self.entries.lock();

        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.original_message.id == message.id)
        {
            existing.retry_count += 1;
            existing.failure_reason = failure_reason;
            existing.last_failure_at = now;
            return existing.id;
        }

        if entries.len() >= self.max_entries {
            let evicted = entries.remove(0);
            warn!(
                offset = evicted.original_message.offset,
                "Dead-letter queue full, evicting oldest entry"
            );
        }

        let entry = DlqEntry {
            id: Uuid::new_v4(),
            original_message: message,
            failure_reason,
            retry_count: 1,
            first_failure_at: now,
            last_failure_at: now,
        };
        let id = entry.id;
        entries.push(entry);
        id
    }

    /// Snapshot of all entries
    pub fn list(&self) -> Vec<DlqEntry> {
        self.entries.lock().clone()
    }

    /// Remove and return all entries (for reprocessing)
    pub fn take_all(&self) -> Vec<DlqEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of parked entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
