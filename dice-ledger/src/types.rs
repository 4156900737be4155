//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer minor units for money)
//! - Decimal conversion only at the boundary

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actor identifier (chat-platform user id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Create new actor ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Oat amount in minor units (hundredths)
///
/// Every value entering the ledger is truncated toward zero to two decimal
/// places before it is compared or applied, so `0.005` and `0.0049999`
/// normalize to the same (zero, rejected) amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero oats
    pub const ZERO: Amount = Amount(0);

    /// Decimal places kept
    pub const SCALE: u32 = 2;

    const MINOR_PER_UNIT: i64 = 100;

    /// Create from minor units
    pub const fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    /// Minor units (hundredths of an oat)
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Normalize a decimal into a positive amount
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let truncated = value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::ToZero);
        if truncated <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "{} is not greater than 0.00 after truncation to two decimals",
                value
            )));
        }

        truncated
            .checked_mul(Decimal::from(Self::MINOR_PER_UNIT))
            .and_then(|minor| minor.to_i64())
            .map(Self)
            .ok_or_else(|| Error::InvalidAmount(format!("{} is out of range", value)))
    }

    /// Normalize a float into a positive amount
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidAmount(format!("{} is not finite", value)));
        }

        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| Error::InvalidAmount(format!("{} is out of range", value)))?;
        Self::from_decimal(decimal)
    }

    /// Exact decimal value with two decimal places
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction, `None` if the result would be negative
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0
            .checked_sub(other.0)
            .filter(|units| *units >= 0)
            .map(Amount)
    }

    /// Whether the amount is zero
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| Error::InvalidAmount(format!("'{}' is not a number: {}", s, e)))?;
        Self::from_decimal(decimal)
    }
}

/// Persisted balance record (one per actor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Current balance
    pub balance: Amount,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl BalanceRecord {
    /// Record for a balance changed now
    pub fn new(balance: Amount) -> Self {
        Self {
            balance,
            updated_at: Utc::now(),
        }
    }
}

/// Actor and balance pair for administrative listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Actor
    pub actor: ActorId,

    /// Balance
    pub balance: Amount,
}

/// Outcome of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Sender
    pub from: ActorId,

    /// Receiver
    pub to: ActorId,

    /// Normalized amount moved
    pub amount: Amount,

    /// Sender balance after the transfer
    pub from_balance: Amount,

    /// Receiver balance after the transfer
    pub to_balance: Amount,
}
