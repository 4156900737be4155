//! Dice bot service
//!
//! Command handlers over the oat ledger, the dice game math, and the
//! combined configuration used by the `dice` binary to run the ledger and
//! the settlement reconciler side by side.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod commands;
pub mod config;
pub mod error;
pub mod game;

// Re-exports
pub use commands::{CommandContext, CommandResponse, Embed, EmbedField, User};
pub use config::{BotConfig, Config, LogConfig};
pub use error::{Error, Result};
