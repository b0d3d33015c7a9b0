//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `lifecycle_operations_total` - Operations by name and outcome (error kind)
//! - `lifecycle_commit_duration_seconds` - Histogram of commit latencies
//! - `lifecycle_assets_total` - Number of registered assets
//! - `lifecycle_last_sequence` - Sequence of the newest ledger record

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each instance owns its registry so several ledgers can live in one process.
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Operations by name and outcome
    pub operations_total: IntCounterVec,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Registered assets
    pub assets_total: IntGauge,

    /// Newest ledger sequence
    pub last_sequence: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_operations_total",
                "Ledger operations by name and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lifecycle_commit_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let assets_total = IntGauge::new("lifecycle_assets_total", "Number of registered assets")?;
        registry.register(Box::new(assets_total.clone()))?;

        let last_sequence =
            IntGauge::new("lifecycle_last_sequence", "Sequence of the newest ledger record")?;
        registry.register(Box::new(last_sequence.clone()))?;

        Ok(Self {
            operations_total,
            commit_duration,
            assets_total,
            last_sequence,
            registry,
        })
    }

    /// Record an operation outcome ("ok" or an error kind label)
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Update ledger size gauges
    pub fn update_totals(&self, assets: usize, last_sequence: u64) {
        self.assets_total.set(assets as i64);
        self.last_sequence.set(last_sequence as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
