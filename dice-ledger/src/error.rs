//! Error types for the ledger

use crate::types::{ActorId, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is non-finite, not positive after normalization, or would overflow
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Debit exceeds the actor's balance
    #[error("Insufficient funds for {actor}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Actor being debited
        actor: ActorId,
        /// Balance at the time of the check
        balance: Amount,
        /// Normalized amount requested
        requested: Amount,
    },

    /// Transfer source and destination are the same actor
    #[error("Cannot transfer to self: {0}")]
    SelfTransfer(ActorId),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by the request itself rather than the backend
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_) | Error::InsufficientFunds { .. } | Error::SelfTransfer(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
