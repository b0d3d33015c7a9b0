//! Message publisher

use crate::{
    log::NotificationLog,
    message::Message,
    metrics::MESSAGE_PUBLISH_TOTAL,
};
use std::sync::Arc;
use tracing::debug;

/// Publishes messages onto the notification log
#[derive(Debug, Clone)]
pub struct Publisher {
    log: Arc<NotificationLog>,
}

impl Publisher {
    /// Create new publisher
    pub fn new(log: Arc<NotificationLog>) -> Self {
        Self { log }
    }

    /// Publish message, returning its delivery offset
    pub fn publish(&self, message: Message) -> u64 {
        let subject = message.subject();
        let message_type = message.message_type;
        let offset = self.log.append(message);

        MESSAGE_PUBLISH_TOTAL
            .with_label_values(&[message_type.subject_prefix()])
            .inc();
        debug!(offset, subject = %subject, "Message published");

        offset
    }

    /// The log this publisher writes to
    pub fn log(&self) -> &Arc<NotificationLog> {
        &self.log
    }
}
