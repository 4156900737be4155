//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_credits_total` - Committed credits
//! - `ledger_debits_total` - Committed debits
//! - `ledger_transfers_total` - Committed transfers
//! - `ledger_rejections_total{reason}` - Requests refused by validation
//! - `ledger_write_duration_seconds` - Histogram of commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed credits
    pub credits_total: IntCounter,

    /// Committed debits
    pub debits_total: IntCounter,

    /// Committed transfers
    pub transfers_total: IntCounter,

    /// Rejected requests by reason
    pub rejections_total: IntCounterVec,

    /// Commit duration histogram
    pub write_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let credits_total = IntCounter::new("ledger_credits_total", "Committed credits")?;
        registry.register(Box::new(credits_total.clone()))?;

        let debits_total = IntCounter::new("ledger_debits_total", "Committed debits")?;
        registry.register(Box::new(debits_total.clone()))?;

        let transfers_total = IntCounter::new("ledger_transfers_total", "Committed transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("ledger_rejections_total", "Requests refused by validation"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let write_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_write_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(write_duration.clone()))?;

        Ok(Self {
            credits_total,
            debits_total,
            transfers_total,
            rejections_total,
            write_duration,
            registry,
        })
    }

    /// Record a refused request
    pub fn record_rejection(&self, error: &crate::Error) {
        let reason = match error {
            crate::Error::InvalidAmount(_) => "invalid_amount",
            crate::Error::InsufficientFunds { .. } => "insufficient_funds",
            crate::Error::SelfTransfer(_) => "self_transfer",
            _ => return,
        };
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record commit duration
    pub fn record_write_duration(&self, duration_seconds: f64) {
        self.write_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("credits_total", &self.credits_total.get())
            .field("debits_total", &self.debits_total.get())
            .field("transfers_total", &self.transfers_total.get())
            .finish()
    }
}
