//! Dice Ledger
//!
//! Per-actor oat balances with atomic credit, debit and transfer.
//!
//! # Architecture
//!
//! - **Single Writer**: every mutation goes through one writer task, so
//!   read-modify-write on a balance is linearizable
//! - **Minor Units**: balances are `i64` hundredths of an oat, never floats
//! - **Atomic Commits**: each mutation (both legs of a transfer included) is
//!   one RocksDB write batch
//!
//! # Invariants
//!
//! - Non-negativity: no balance is ever observed below zero
//! - Conservation: transfers are zero-sum; supply changes only through
//!   explicit credits and debits
//! - Lazy accounts: an unknown actor has balance zero; records are never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{ActorId, Amount, BalanceEntry, BalanceRecord, TransferReceipt};
pub use ledger::Ledger;
pub use config::Config;
pub use storage::Storage;
