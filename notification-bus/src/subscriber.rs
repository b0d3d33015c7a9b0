//! Durable subscriber with committed offsets
//!
//! A subscriber owns one bounded inbound channel. A feeder task pulls entries
//! from the [`NotificationLog`] after the consumer's committed offset and
//! pushes them into the channel; the consumption loop pulls one message at a
//! time, hands it to the [`MessageHandler`] and only then commits the offset.
//! A crash between handling and committing re-delivers the message, so
//! handlers must be idempotent.
//!
//! Handler failures are not retried in place: the message is parked in the
//! [`DeadLetterQueue`] and the offset advances.
//!
//! A committed offset must lie between the log's retention floor and its
//! head. Anything else means the offsets belong to another log, and resuming
//! fails instead of silently skipping notifications.

use crate::{
    dead_letter::DeadLetterQueue,
    log::NotificationLog,
    message::Message,
    metrics::{DEAD_LETTER_TOTAL, MESSAGE_PROCESS_DURATION, MESSAGE_RECEIVE_TOTAL},
    types::MessageType,
    Error, Result,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Message handler trait
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle incoming message
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Persistent record of how far each consumer got
pub trait OffsetStore: Send + Sync {
    /// Last committed offset for `consumer` (0 if none)
    fn load_offset(&self, consumer: &str) -> Result<u64>;

    /// Record that everything up to and including `offset` was processed
    fn commit_offset(&self, consumer: &str, offset: u64) -> Result<()>;
}

/// Volatile offset store
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    offsets: Mutex<HashMap<String, u64>>,
}

impl OffsetStore for MemoryOffsetStore {
    fn load_offset(&self, consumer: &str) -> Result<u64> {
        Ok(self.offsets.lock().get(consumer).copied().unwrap_or(0))
    }

    fn commit_offset(&self, consumer: &str, offset: u64) -> Result<()> {
        self.offsets.lock().insert(consumer.to_string(), offset);
        Ok(())
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Durable consumer name (key in the offset store)
    pub durable_name: String,

    /// Bounded inbound channel capacity
    pub channel_capacity: usize,

    /// Max messages pulled from the log per fetch
    pub fetch_batch: usize,

    /// Message types to handle; empty means all
    pub message_types: Vec<MessageType>,

    /// Release log entries once committed (only for a sole consumer)
    pub truncate_log: bool,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            durable_name: "mirror-sync".to_string(),
            channel_capacity: 1024,
            fetch_batch: 256,
            message_types: vec![],
            truncate_log: false,
        }
    }
}

/// Outcome of delivering one message to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handler succeeded
    Handled,
    /// Message type not subscribed; skipped
    Filtered,
    /// Handler failed; message parked in the dead-letter queue
    DeadLettered,
}

/// Message subscriber
pub struct Subscriber {
    log: Arc<NotificationLog>,
    config: SubscriberConfig,
    dead_letters: Arc<DeadLetterQueue>,
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(log: Arc<NotificationLog>, config: SubscriberConfig) -> Self {
        Self {
            log,
            config,
            dead_letters: Arc::new(DeadLetterQueue::default()),
        }
    }

    /// Use a shared dead-letter queue
    pub fn with_dead_letters(mut self, dead_letters: Arc<DeadLetterQueue>) -> Self {
        self.dead_letters = dead_letters;
        self
    }

    /// Dead-letter queue for this subscriber
    pub fn dead_letters(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letters
    }

    /// Subscriber configuration
    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Consume until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Returns the last committed offset.
    pub async fn run<H, O>(
        &self,
        handler: Arc<H>,
        offsets: Arc<O>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<u64>
    where
        H: MessageHandler + 'static,
        O: OffsetStore + 'static,
    {
        let consumer = self.config.durable_name.clone();
        let start = self.resume_offset(offsets.as_ref())?;

        info!(
            consumer = %consumer,
            start_offset = start,
            head = self.log.head(),
            "Subscriber resuming"
        );

        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let feeder = tokio::spawn(feed(
            self.log.clone(),
            start,
            self.config.fetch_batch.max(1),
            tx,
        ));

        let mut committed = start;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                next = rx.recv() => {
                    let Some(message) = next else { break };
                    let offset = message.offset;
                    self.deliver(handler.as_ref(), message).await;
                    self.commit(offsets.as_ref(), offset)?;
                    committed = offset;
                }
            }
        }

        feeder.abort();
        info!(consumer = %consumer, committed, "Subscriber stopped");
        Ok(committed)
    }

    /// Process everything currently in the log after the committed offset,
    /// then return the new committed offset.
    pub async fn catch_up<H, O>(&self, handler: &H, offsets: &O) -> Result<u64>
    where
        H: MessageHandler,
        O: OffsetStore,
    {
        let consumer = &self.config.durable_name;
        let mut committed = self.resume_offset(offsets)?;

        loop {
            let batch = self.log.read_after(committed, self.config.fetch_batch.max(1));
            if batch.is_empty() {
                break;
            }
            for message in batch {
                let offset = message.offset;
                self.deliver(handler, message).await;
                self.commit(offsets, offset)?;
                committed = offset;
            }
        }

        debug!(consumer = %consumer, committed, "Caught up with log head");
        Ok(committed)
    }

    /// Committed offset, checked against the log bounds
    fn resume_offset<O: OffsetStore + ?Sized>(&self, offsets: &O) -> Result<u64> {
        let consumer = &self.config.durable_name;
        let committed = offsets.load_offset(consumer)?;
        let head = self.log.head();
        let floor = self.log.floor();

        if committed > head {
            error!(consumer = %consumer, committed, head, "Committed offset is ahead of the log");
            return Err(Error::OffsetStore(format!(
                "consumer {} committed offset {} beyond log head {}",
                consumer, committed, head
            )));
        }
        if committed < floor {
            error!(consumer = %consumer, committed, floor, "Log released entries the consumer never committed");
            return Err(Error::OffsetStore(format!(
                "consumer {} committed offset {} below log floor {}",
                consumer, committed, floor
            )));
        }

        if self.config.truncate_log {
            self.log.truncate_through(committed);
        }
        Ok(committed)
    }

    fn commit<O: OffsetStore + ?Sized>(&self, offsets: &O, offset: u64) -> Result<()> {
        offsets.commit_offset(&self.config.durable_name, offset)?;
        if self.config.truncate_log {
            self.log.truncate_through(offset);
        }
        Ok(())
    }

    /// Retry every dead-lettered message; returns how many now succeeded
    pub async fn reprocess_dead_letters<H>(&self, handler: &H) -> usize
    where
        H: MessageHandler,
    {
        let mut recovered = 0;
        for entry in self.dead_letters.take_all() {
            let message = entry.original_message;
            match handler.handle(message.clone()).await {
                Ok(()) => recovered += 1,
                Err(e) => {
                    warn!(offset = message.offset, "Dead letter still failing: {}", e);
                    self.dead_letters.push(message, e.to_string());
                }
            }
        }
        recovered
    }

    /// Deliver one message to the handler
    pub async fn deliver<H>(&self, handler: &H, message: Message) -> Delivery
    where
        H: MessageHandler + ?Sized,
    {
        let label = message.message_type.subject_prefix();

        if !self.config.message_types.is_empty()
            && !self.config.message_types.contains(&message.message_type)
        {
            MESSAGE_RECEIVE_TOTAL.with_label_values(&[label, "filtered"]).inc();
            return Delivery::Filtered;
        }

        let start = Instant::now();
        let offset = message.offset;
        let outcome = match handler.handle(message.clone()).await {
            Ok(()) => {
                MESSAGE_RECEIVE_TOTAL.with_label_values(&[label, "success"]).inc();
                Delivery::Handled
            }
            Err(e) => {
                error!(offset, subject = %message.subject(), "Error handling message, skipping: {}", e);
                MESSAGE_RECEIVE_TOTAL.with_label_values(&[label, "error"]).inc();
                DEAD_LETTER_TOTAL
                    .with_label_values(&[self.config.durable_name.as_str()])
                    .inc();
                self.dead_letters.push(message, e.to_string());
                Delivery::DeadLettered
            }
        };

        MESSAGE_PROCESS_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        outcome
    }
}

/// Pull from the log into the bounded channel until the receiver goes away
async fn feed(
    log: Arc<NotificationLog>,
    mut cursor: u64,
    fetch_batch: usize,
    tx: mpsc::Sender<Message>,
) -> Result<()> {
    loop {
        let batch = log.read_after(cursor, fetch_batch);
        if batch.is_empty() {
            log.wait_beyond(cursor).await;
            continue;
        }

        for message in batch {
            cursor = message.offset;
            tx.send(message)
                .await
                .map_err(|_| Error::ChannelClosed("subscriber inbound channel".to_string()))?;
        }
    }
}
