//! Error types for the settlement reconciler

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction feed could not be fetched or parsed; retried next tick
    #[error("Transaction feed unavailable: {0}")]
    FeedUnavailable(String),

    /// Ledger refused or failed a settlement credit; receipt left unrecorded
    #[error("Credit for receipt {receipt} failed: {source}")]
    CreditApplicationFailed {
        /// Receipt that was not applied
        receipt: String,
        /// Underlying ledger error
        #[source]
        source: dice_ledger::Error,
    },

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] dice_ledger::Error),

    /// Receipt storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Outbound notification failed
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
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
