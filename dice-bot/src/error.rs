//! Error types for the bot service

use thiserror::Error;

/// Result type for bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bot errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] dice_ledger::Error),

    /// Settlement error
    #[error("Settlement error: {0}")]
    Settlement(#[from] dice_settlement::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
