//! Main ledger orchestration layer
//!
//! This module ties together storage, validation, and the writer actor
//! into the balance API used by command handlers and the settlement
//! reconciler.
//!
//! # Example
//!
//! ```no_run
//! use dice_ledger::{ActorId, Config, Ledger};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> dice_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let alice = ActorId::new("alice");
//!     let bob = ActorId::new("bob");
//!     ledger.increase_balance(&alice, Decimal::new(100000, 2)).await?;
//!     ledger.transfer(&alice, &bob, Decimal::new(50000, 2)).await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    types::{ActorId, Amount, BalanceEntry, TransferReceipt},
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Writer task, taken on shutdown
    writer: Mutex<Option<JoinHandle<()>>>,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Other(format!("Failed to create metrics: {}", e)))?;
        Self::open_with_metrics(config, metrics).await
    }

    /// Open ledger reporting into the given metrics
    pub async fn open_with_metrics(config: Config, metrics: Metrics) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        let (handle, writer) =
            spawn_ledger_actor(storage.clone(), config.mailbox_capacity, metrics.clone());

        tracing::info!(
            service = %config.service_name,
            data_dir = ?config.data_dir,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            writer: Mutex::new(Some(writer)),
            storage,
            metrics,
            config,
        })
    }

    /// Current balance, zero for an actor never seen before
    ///
    /// Only fails if the underlying store cannot be read.
    pub async fn get_balance(&self, actor: &ActorId) -> Result<Amount> {
        self.storage.get_balance(actor)
    }

    /// Credit an actor, returning the new balance
    pub async fn increase_balance(&self, actor: &ActorId, amount: Decimal) -> Result<Amount> {
        let amount = self.normalize(amount)?;
        self.handle.credit(actor.clone(), amount).await
    }

    /// Debit an actor, returning the new balance
    ///
    /// Fails with [`Error::InsufficientFunds`] and leaves the balance
    /// untouched if the normalized amount exceeds the balance.
    pub async fn decrease_balance(&self, actor: &ActorId, amount: Decimal) -> Result<Amount> {
        let amount = self.normalize(amount)?;
        self.handle.debit(actor.clone(), amount).await
    }

    /// Move funds between two distinct actors
    ///
    /// Both balances change together or not at all.
    pub async fn transfer(
        &self,
        from: &ActorId,
        to: &ActorId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        if from == to {
            let err = Error::SelfTransfer(from.clone());
            self.metrics.record_rejection(&err);
            return Err(err);
        }

        let amount = self.normalize(amount)?;
        let receipt = self.handle.transfer(from.clone(), to.clone(), amount).await?;

        tracing::info!(
            from = %receipt.from,
            to = %receipt.to,
            amount = %receipt.amount,
            "Transfer completed"
        );

        Ok(receipt)
    }

    /// Number of actors with a balance record
    pub async fn total_users(&self) -> Result<u64> {
        self.storage.count_actors()
    }

    /// Every actor with a balance record
    pub async fn all_users(&self) -> Result<Vec<BalanceEntry>> {
        self.storage.all_balances()
    }

    /// Sum of all balances
    pub async fn total_supply(&self) -> Result<Amount> {
        self.storage.total_supply()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the writer after it drains its mailbox
    pub async fn shutdown(&self) -> Result<()> {
        let Some(writer) = self.writer.lock().await.take() else {
            return Ok(());
        };

        self.handle.shutdown().await?;
        writer
            .await
            .map_err(|e| Error::Concurrency(format!("Ledger writer panicked: {}", e)))?;
        self.storage.flush()?;

        tracing::info!("Ledger shut down");
        Ok(())
    }

    fn normalize(&self, amount: Decimal) -> Result<Amount> {
        Amount::from_decimal(amount).map_err(|e| {
            self.metrics.record_rejection(&e);
            e
        })
    }
}
