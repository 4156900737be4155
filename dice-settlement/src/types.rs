//! Core types for the settlement reconciler

use chrono::{DateTime, Utc};
use dice_ledger::{ActorId, Amount};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction type tag as sent by the feed
///
/// Only refunds are excluded from crediting; unknown tags are credited
/// like conversions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    /// Currency converted into oats
    Conversion,
    /// Refund of a failed conversion, never credited
    Refund,
    /// Any other tag
    Other(String),
}

impl TransactionKind {
    /// Whether transactions of this kind result in a ledger credit
    pub fn is_creditable(&self) -> bool {
        !matches!(self, TransactionKind::Refund)
    }

    /// Wire tag
    pub fn as_str(&self) -> &str {
        match self {
            TransactionKind::Conversion => "conversion",
            TransactionKind::Refund => "refund",
            TransactionKind::Other(tag) => tag,
        }
    }
}

impl From<String> for TransactionKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "conversion" => TransactionKind::Conversion,
            "refund" => TransactionKind::Refund,
            _ => TransactionKind::Other(tag),
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction as listed by the settlement feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementTransaction {
    /// Globally unique receipt (idempotency key)
    pub receipt: String,

    /// Credited actor
    #[serde(rename = "user")]
    pub actor: ActorId,

    /// Amount in oats, already converted by the network
    pub amount: f64,

    /// Type tag
    #[serde(rename = "type")]
    pub kind: TransactionKind,

    /// Origination time (Unix seconds)
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// Source currency code
    #[serde(default)]
    pub source: Option<String>,
}

impl SettlementTransaction {
    /// Amount as a decimal for the ledger
    pub fn credit_amount(&self) -> dice_ledger::Result<Decimal> {
        if !self.amount.is_finite() {
            return Err(dice_ledger::Error::InvalidAmount(format!(
                "{} is not finite",
                self.amount
            )));
        }
        Decimal::from_f64(self.amount).ok_or_else(|| {
            dice_ledger::Error::InvalidAmount(format!("{} is out of range", self.amount))
        })
    }

    /// Origination time, if present and representable
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        let seconds = self.timestamp?;
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.trunc() as i64;
        let nanos = (seconds.fract() * 1e9) as u32;
        DateTime::from_timestamp(whole, nanos)
    }
}

/// Durable record of a receipt that produced a ledger credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedReceipt {
    /// Receipt
    pub receipt: String,

    /// Credited actor
    pub actor: ActorId,

    /// Normalized amount credited
    pub amount: Amount,

    /// When the credit was committed
    pub applied_at: DateTime<Utc>,
}

/// What a notifier is told about an applied settlement
#[derive(Debug, Clone, PartialEq)]
pub struct CreditNotice {
    /// Source transaction
    pub transaction: SettlementTransaction,

    /// Amount actually credited (normalized)
    pub credited: Amount,

    /// Actor balance after the credit
    pub new_balance: Amount,
}

/// Reconciler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    /// Waiting for the next tick
    Idle,
    /// Poll cycle in flight
    Polling,
}

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Transactions returned by the feed
    pub fetched: usize,

    /// Credited and recorded
    pub applied: usize,

    /// Skipped because the type tag is `refund`
    pub skipped_refunds: usize,

    /// Skipped because the receipt was already applied
    pub skipped_duplicates: usize,

    /// Credit failed; left unrecorded for retry
    pub failed: usize,
}

/// Result of asking for a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Cycle ran to completion
    Completed(PollReport),
    /// Another cycle was in flight, nothing done
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_transaction() {
        let json = r#"{
            "user": "395509201402855424",
            "timestamp": 1522363427.5,
            "source": "DTS",
            "amount": 10.0,
            "receipt": "5abd3d4b29d3d53a0e6d3d4b",
            "type": "conversion"
        }"#;

        let tx: SettlementTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.actor, ActorId::new("395509201402855424"));
        assert_eq!(tx.kind, TransactionKind::Conversion);
        assert_eq!(tx.source.as_deref(), Some("DTS"));
        assert_eq!(tx.credit_amount().unwrap(), Decimal::new(10, 0));
        assert_eq!(tx.occurred_at().unwrap().timestamp(), 1522363427);
    }

    #[test]
    fn test_unknown_kind_is_creditable() {
        let kind = TransactionKind::from("bonus".to_string());
        assert_eq!(kind, TransactionKind::Other("bonus".to_string()));
        assert!(kind.is_creditable());
        assert!(!TransactionKind::Refund.is_creditable());
        assert_eq!(String::from(TransactionKind::Refund), "refund");
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{"user":"1","amount":2.5,"receipt":"r","type":"refund"}"#;
        let tx: SettlementTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionKind::Refund);
        assert!(tx.occurred_at().is_none());
        assert!(tx.source.is_none());
    }
}
