//! Notification bus for lifecycle events
//!
//! Provides ordered, at-least-once delivery with:
//! - An append-only in-process notification log with monotonically increasing offsets
//! - Partitioning by entity key (per-key ordering is the log order)
//! - Durable consumers that resume from a committed offset
//! - Dead-letter capture for notifications a handler could not apply
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod dead_letter;
pub mod error;
pub mod log;
pub mod message;
pub mod metrics;
pub mod partitioning;
pub mod publisher;
pub mod subscriber;
pub mod types;

pub use dead_letter::{DeadLetterQueue, DlqEntry};
pub use error::{Error, Result};
pub use log::NotificationLog;
pub use message::Message;
pub use publisher::Publisher;
pub use subscriber::{
    Delivery, MemoryOffsetStore, MessageHandler, OffsetStore, Subscriber, SubscriberConfig,
};
pub use types::{MessageType, PartitionKey};
