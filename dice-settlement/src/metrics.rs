//! Prometheus metrics for the reconciler
//!
//! - `settlement_polls_total{outcome}` - Poll cycles by outcome
//!   (`completed`, `skipped`, `feed_unavailable`)
//! - `settlement_receipts_applied_total` - Receipts credited and recorded
//! - `settlement_receipts_duplicate_total` - Listed receipts already applied
//! - `settlement_credit_failures_total` - Credits refused or failed
//! - `settlement_notification_failures_total` - Notices that could not be delivered
//! - `settlement_poll_duration_seconds` - Histogram of poll cycle latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Poll cycles by outcome
    pub polls_total: IntCounterVec,

    /// Receipts applied
    pub receipts_applied_total: IntCounter,

    /// Receipts skipped as already applied
    pub receipts_duplicate_total: IntCounter,

    /// Failed credits
    pub credit_failures_total: IntCounter,

    /// Failed notifications
    pub notification_failures_total: IntCounter,

    /// Poll duration histogram
    pub poll_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let polls_total = IntCounterVec::new(
            Opts::new("settlement_polls_total", "Poll cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(polls_total.clone()))?;

        let receipts_applied_total = IntCounter::new(
            "settlement_receipts_applied_total",
            "Receipts credited and recorded",
        )?;
        registry.register(Box::new(receipts_applied_total.clone()))?;

        let receipts_duplicate_total = IntCounter::new(
            "settlement_receipts_duplicate_total",
            "Listed receipts already applied",
        )?;
        registry.register(Box::new(receipts_duplicate_total.clone()))?;

        let credit_failures_total = IntCounter::new(
            "settlement_credit_failures_total",
            "Credits refused or failed",
        )?;
        registry.register(Box::new(credit_failures_total.clone()))?;

        let notification_failures_total = IntCounter::new(
            "settlement_notification_failures_total",
            "Notices that could not be delivered",
        )?;
        registry.register(Box::new(notification_failures_total.clone()))?;

        let poll_duration = Histogram::with_opts(
            HistogramOpts::new(
                "settlement_poll_duration_seconds",
                "Histogram of poll cycle latencies",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(poll_duration.clone()))?;

        Ok(Self {
            polls_total,
            receipts_applied_total,
            receipts_duplicate_total,
            credit_failures_total,
            notification_failures_total,
            poll_duration,
            registry,
        })
    }

    /// Record a poll cycle outcome
    pub fn record_poll(&self, outcome: &str) {
        self.polls_total.with_label_values(&[outcome]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("receipts_applied_total", &self.receipts_applied_total.get())
            .field("credit_failures_total", &self.credit_failures_total.get())
            .finish()
    }
}
