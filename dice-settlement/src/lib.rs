//! Settlement Reconciler
//!
//! Ingests currency conversions from the Discoin settlement network into the
//! oat ledger, applying every receipt at most once.
//!
//! # Architecture
//!
//! The reconciler alternates between `Idle` and `Polling` on a fixed timer
//! (default every 5 minutes, plus once at startup):
//!
//! 1. **Fetch**: pull the full transaction list from the feed
//! 2. **Filter**: drop refunds and receipts already in the applied set
//! 3. **Credit**: `Ledger::increase_balance` for each new transaction
//! 4. **Record**: persist the receipt only after the credit succeeded
//! 5. **Notify**: best-effort message to the actor and the log channel
//!
//! Feed outages and failed credits are logged and retried on the next tick;
//! nothing in a poll cycle can take the process down.
//!
//! # Example
//!
//! ```no_run
//! use dice_settlement::{
//!     Config, HttpTransactionFeed, ReceiptStore, Reconciler, TracingNotifier,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> dice_settlement::Result<()> {
//!     let config = Config::default();
//!     let ledger = Arc::new(dice_ledger::Ledger::open(Default::default()).await?);
//!
//!     let reconciler = Arc::new(Reconciler::new(
//!         ledger,
//!         Arc::new(HttpTransactionFeed::new(config.feed.clone())?),
//!         Arc::new(ReceiptStore::open(&config.receipts)?),
//!         Arc::new(TracingNotifier::new(config.notifications.currency_plural.clone())),
//!         config,
//!     )?);
//!
//!     let running = reconciler.start();
//!     tokio::signal::ctrl_c().await?;
//!     running.stop().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod feed;
pub mod receipts;
pub mod notify;
pub mod reconciler;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use feed::{HttpTransactionFeed, TransactionFeed};
pub use notify::{
    DirectMessageNotifier, FanoutNotifier, Notifier, TracingNotifier, WebhookNotifier,
};
pub use receipts::ReceiptStore;
pub use reconciler::{Reconciler, ReconcilerTask};
