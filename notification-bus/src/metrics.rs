//! Prometheus metrics for the notification bus

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total messages published
    pub static ref MESSAGE_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "notification_bus_publish_total",
        "Total messages published",
        &["message_type"]
    )
    .unwrap();

    /// Total messages received by consumers
    pub static ref MESSAGE_RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "notification_bus_receive_total",
        "Total messages received",
        &["message_type", "status"]
    )
    .unwrap();

    /// Message processing duration
    pub static ref MESSAGE_PROCESS_DURATION: HistogramVec = register_histogram_vec!(
        "notification_bus_process_duration_seconds",
        "Message processing duration in seconds",
        &["message_type"]
    )
    .unwrap();

    /// Messages routed to the dead-letter queue
    pub static ref DEAD_LETTER_TOTAL: CounterVec = register_counter_vec!(
        "notification_bus_dead_letter_total",
        "Messages parked in the dead-letter queue",
        &["consumer"]
    )
    .unwrap();
}
