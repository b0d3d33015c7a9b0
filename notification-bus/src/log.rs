//! Append-only notification log
//!
//! The log is the delivery medium between the ledger (single publisher) and
//! its subscribers. Offsets start at 1 and increase by one per append, so a
//! consumer that has committed offset `n` resumes by reading everything after
//! `n`. Entries up to the retention floor can be released with
//! [`NotificationLog::truncate_through`] once every consumer committed them;
//! offsets are never reused.

use crate::{message::Message, types::PartitionKey};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Entries {
    /// Offset of the last released entry (0 when nothing was released)
    floor: u64,
    retained: VecDeque<Message>,
}

impl Entries {
    fn index_after(&self, offset: u64) -> usize {
        usize::try_from(offset.saturating_sub(self.floor))
            .unwrap_or(usize::MAX)
            .min(self.retained.len())
    }
}

/// In-process append-only log of notifications
#[derive(Debug)]
pub struct NotificationLog {
    entries: RwLock<Entries>,
    head: watch::Sender<u64>,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationLog {
    /// Create an empty log
    pub fn new() -> Self {
        let (head, _) = watch::channel(0);
        Self {
            entries: RwLock::new(Entries::default()),
            head,
        }
    }

    /// Append a message, assigning its offset
    pub fn append(&self, mut message: Message) -> u64 {
        let offset = {
            let mut entries = self.entries.write();
            let offset = entries.floor + entries.retained.len() as u64 + 1;
            message.offset = offset;
            entries.retained.push_back(message);
            offset
        };

        self.head.send_replace(offset);
        offset
    }

    /// Offset of the newest entry (0 when empty)
    pub fn head(&self) -> u64 {
        *self.head.borrow()
    }

    /// Offset of the last released entry; reads start after it
    pub fn floor(&self) -> u64 {
        self.entries.read().floor
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.read().retained.len()
    }

    /// Whether no entries are retained
    pub fn is_empty(&self) -> bool {
        self.entries.read().retained.is_empty()
    }

    /// Read up to `limit` retained entries with offset greater than `offset`
    pub fn read_after(&self, offset: u64, limit: usize) -> Vec<Message> {
        let entries = self.entries.read();
        let start = entries.index_after(offset);
        entries.retained.range(start..).take(limit).cloned().collect()
    }

    /// Get the entry at `offset`, if still retained
    pub fn get(&self, offset: u64) -> Option<Message> {
        let entries = self.entries.read();
        let index = usize::try_from(offset.checked_sub(entries.floor + 1)?).ok()?;
        entries.retained.get(index).cloned()
    }

    /// Release every entry with offset up to `offset` (capped at the head).
    ///
    /// Returns how many entries were dropped.
    pub fn truncate_through(&self, offset: u64) -> usize {
        let mut entries = self.entries.write();
        let released = entries.index_after(offset);
        if released == 0 {
            return 0;
        }
        entries.retained.drain(..released);
        entries.floor += released as u64;
        released
    }

    /// Retained history for one partition key, in publish order
    pub fn history(&self, key: &PartitionKey) -> Vec<Message> {
        self.entries
            .read()
            .retained
            .iter()
            .filter(|m| &m.partition_key == key)
            .cloned()
            .collect()
    }

    /// Wait until the head moves past `offset`
    pub async fn wait_beyond(&self, offset: u64) {
        let mut rx = self.head.subscribe();
        // The sender lives as long as the log, so this only fails on teardown.
        let _ = rx.wait_for(|head| *head > offset).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn msg(id: u64) -> Message {
        Message::new(
            MessageType::AssetLifecycle,
            PartitionKey::Entity(id),
            json!({ "id": id }),
        )
    }

    #[test]
    fn test_offsets_are_sequential() {
        let log = NotificationLog::new();
        assert_eq!(log.head(), 0);
        assert!(log.is_empty());

        assert_eq!(log.append(msg(1)), 1);
        assert_eq!(log.append(msg(2)), 2);
        assert_eq!(log.append(msg(1)), 3);

        assert_eq!(log.head(), 3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(2).unwrap().offset, 2);
        assert!(log.get(0).is_none());
        assert!(log.get(4).is_none());
    }

    #[test]
    fn test_read_after_and_history() {
        let log = NotificationLog::new();
        for id in [1, 2, 1, 3, 1] {
            log.append(msg(id));
        }

        let tail = log.read_after(2, 10);
        assert_eq!(tail.iter().map(|m| m.offset).collect::<Vec<_>>(), vec![3, 4, 5]);

        let limited = log.read_after(0, 2);
        assert_eq!(limited.len(), 2);

        assert!(log.read_after(5, 10).is_empty());
        assert!(log.read_after(99, 10).is_empty());

        let history = log.history(&PartitionKey::Entity(1));
        assert_eq!(history.iter().map(|m| m.offset).collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_wait_beyond_wakes_on_append() {
        let log = Arc::new(NotificationLog::new());
        let waiter = {
            let log = log.clone();
            tokio::spawn(async move { log.wait_beyond(0).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        log.append(msg(1));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_truncate_keeps_offsets_and_head() {
        let log = NotificationLog::new();
        for id in 1..=5 {
            log.append(msg(id));
        }

        assert_eq!(log.truncate_through(3), 3);
        assert_eq!(log.floor(), 3);
        assert_eq!(log.len(), 2);
        assert_eq!(log.head(), 5);
        assert!(log.get(3).is_none());
        assert_eq!(log.get(4).unwrap().offset, 4);

        // Reading from below the floor starts at the first retained entry
        let tail = log.read_after(0, 10);
        assert_eq!(tail.iter().map(|m| m.offset).collect::<Vec<_>>(), vec![4, 5]);

        assert_eq!(log.truncate_through(2), 0);
        assert_eq!(log.append(msg(6)), 6);

        assert_eq!(log.truncate_through(99), 3);
        assert_eq!(log.floor(), 6);
        assert!(log.is_empty());
        assert_eq!(log.append(msg(7)), 7);
    }
}
