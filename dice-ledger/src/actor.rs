//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task serializes every balance mutation
//! - Validation and the balance check run inside the writer, so no two
//!   debits can both pass against a stale balance
//! - Async message passing with backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │     Command handlers          Settlement reconciler  │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   read balance(s) → check → Storage::put_balances()   │
//! │              (one atomic write batch)                 │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::metrics::Metrics;
use crate::types::{ActorId, Amount, TransferReceipt};
use crate::{Error, Result, Storage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Credit an actor
    Credit {
        actor: ActorId,
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Debit an actor
    Debit {
        actor: ActorId,
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Move funds between two actors
    Transfer {
        from: ActorId,
        to: ActorId,
        amount: Amount,
        response: oneshot::Sender<Result<TransferReceipt>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Metrics
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>, metrics: Metrics) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => {
                    tracing::info!("Ledger writer shutting down");
                    break;
                }
                msg => self.handle_message(msg),
            }
        }

        // Answer anything still queued so no caller waits forever
        self.mailbox.close();
        while let Ok(msg) = self.mailbox.try_recv() {
            self.handle_message(msg);
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        let started = Instant::now();

        match msg {
            LedgerMessage::Credit {
                actor,
                amount,
                response,
            } => {
                let result = self.credit(&actor, amount);
                if result.is_ok() {
                    self.metrics.credits_total.inc();
                }
                self.finish(&result, started);
                let _ = response.send(result);
            }

            LedgerMessage::Debit {
                actor,
                amount,
                response,
            } => {
                let result = self.debit(&actor, amount);
                if result.is_ok() {
                    self.metrics.debits_total.inc();
                }
                self.finish(&result, started);
                let _ = response.send(result);
            }

            LedgerMessage::Transfer {
                from,
                to,
                amount,
                response,
            } => {
                let result = self.transfer(&from, &to, amount);
                if result.is_ok() {
                    self.metrics.transfers_total.inc();
                }
                self.finish(&result, started);
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn finish<T>(&self, result: &Result<T>, started: Instant) {
        match result {
            Ok(_) => self
                .metrics
                .record_write_duration(started.elapsed().as_secs_f64()),
            Err(e) if e.is_rejection() => self.metrics.record_rejection(e),
            Err(e) => tracing::error!(error = %e, "Ledger write failed"),
        }
    }

    fn credit(&self, actor: &ActorId, amount: Amount) -> Result<Amount> {
        let balance = self.storage.get_balance(actor)?;
        let new_balance = balance.checked_add(amount).ok_or_else(|| {
            Error::InvalidAmount(format!("crediting {} to {} would overflow", amount, actor))
        })?;

        self.storage.put_balances(&[(actor, new_balance)])?;

        tracing::debug!(actor = %actor, amount = %amount, balance = %new_balance, "Balance increased");
        Ok(new_balance)
    }

    fn debit(&self, actor: &ActorId, amount: Amount) -> Result<Amount> {
        let balance = self.storage.get_balance(actor)?;
        let new_balance = balance
            .checked_sub(amount)
            .ok_or_else(|| Error::InsufficientFunds {
                actor: actor.clone(),
                balance,
                requested: amount,
            })?;

        self.storage.put_balances(&[(actor, new_balance)])?;

        tracing::debug!(actor = %actor, amount = %amount, balance = %new_balance, "Balance decreased");
        Ok(new_balance)
    }

    fn transfer(&self, from: &ActorId, to: &ActorId, amount: Amount) -> Result<TransferReceipt> {
        if from == to {
            return Err(Error::SelfTransfer(from.clone()));
        }

        let from_balance = self.storage.get_balance(from)?;
        let to_balance = self.storage.get_balance(to)?;

        let new_from = from_balance
            .checked_sub(amount)
            .ok_or_else(|| Error::InsufficientFunds {
                actor: from.clone(),
                balance: from_balance,
                requested: amount,
            })?;
        let new_to = to_balance.checked_add(amount).ok_or_else(|| {
            Error::InvalidAmount(format!("crediting {} to {} would overflow", amount, to))
        })?;

        // Both legs in one batch
        self.storage.put_balances(&[(from, new_from), (to, new_to)])?;

        tracing::debug!(from = %from, to = %to, amount = %amount, "Transfer committed");

        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            from_balance: new_from,
            to_balance: new_to,
        })
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Credit an actor, returning the new balance
    pub async fn credit(&self, actor: ActorId, amount: Amount) -> Result<Amount> {
        self.call(|response| LedgerMessage::Credit {
            actor,
            amount,
            response,
        })
        .await
    }

    /// Debit an actor, returning the new balance
    pub async fn debit(&self, actor: ActorId, amount: Amount) -> Result<Amount> {
        self.call(|response| LedgerMessage::Debit {
            actor,
            amount,
            response,
        })
        .await
    }

    /// Transfer between two actors
    pub async fn transfer(&self, from: ActorId, to: ActorId, amount: Amount) -> Result<TransferReceipt> {
        self.call(|response| LedgerMessage::Transfer {
            from,
            to,
            amount,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    mailbox_capacity: usize,
    metrics: Metrics,
) -> (LedgerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, metrics);

    let task = tokio::spawn(async move {
        actor.run().await;
    });

    (LedgerHandle::new(tx), task)
}
