//! Property-based tests for reconciler invariants
//!
//! - Exactly once: however often a listing is polled, every creditable
//!   receipt is credited once and refunds never
//! - Supply injected equals the sum of applied receipts

use async_trait::async_trait;
use dice_ledger::{ActorId, Amount, Ledger};
use dice_settlement::config::ReceiptStoreConfig;
use dice_settlement::{
    Config, CreditNotice, Notifier, PollOutcome, ReceiptStore, Reconciler, Result,
    SettlementTransaction, TransactionFeed, TransactionKind,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct ListingFeed(Vec<SettlementTransaction>);

#[async_trait]
impl TransactionFeed for ListingFeed {
    async fn fetch_transactions(&self) -> Result<Vec<SettlementTransaction>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "listing"
    }
}

struct Silent;

#[async_trait]
impl Notifier for Silent {
    async fn notify(&self, _notice: &CreditNotice) -> Result<()> {
        Ok(())
    }
}

/// (receipt index, actor index, cents, is refund)
fn row_strategy() -> impl Strategy<Value = (u8, u8, i64, bool)> {
    (0u8..12, 0u8..4, 1i64..100_000i64, prop::bool::weighted(0.2))
}

fn listing(rows: &[(u8, u8, i64, bool)]) -> Vec<SettlementTransaction> {
    // A receipt keeps the first row it appeared with
    let mut seen = HashMap::new();
    rows.iter()
        .map(|&(receipt, actor, cents, refund)| {
            let (actor, cents, refund) = *seen.entry(receipt).or_insert((actor, cents, refund));
            SettlementTransaction {
                receipt: format!("receipt-{}", receipt),
                actor: ActorId::new(format!("user-{}", actor)),
                amount: cents as f64 / 100.0,
                kind: if refund {
                    TransactionKind::Refund
                } else {
                    TransactionKind::Conversion
                },
                timestamp: None,
                source: Some("DTS".to_string()),
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: repeated polls credit each creditable receipt exactly once
    #[test]
    fn prop_receipts_applied_exactly_once(
        rows in prop::collection::vec(row_strategy(), 0..30),
        polls in 1usize..4,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ledger_dir = tempfile::tempdir().unwrap();
            let receipts_dir = tempfile::tempdir().unwrap();

            let mut ledger_config = dice_ledger::Config::default();
            ledger_config.data_dir = ledger_dir.path().to_path_buf();
            ledger_config.rocksdb.sync_writes = false;
            let ledger = Arc::new(Ledger::open(ledger_config).await.unwrap());

            let receipts = Arc::new(ReceiptStore::open(&ReceiptStoreConfig {
                data_dir: receipts_dir.path().to_path_buf(),
                sync_writes: false,
            }).unwrap());

            let transactions = listing(&rows);
            let reconciler = Reconciler::new(
                ledger.clone(),
                Arc::new(ListingFeed(transactions.clone())),
                receipts.clone(),
                Arc::new(Silent),
                Config::default(),
            ).unwrap();

            for _ in 0..polls {
                let outcome = reconciler.poll_once().await.unwrap();
                prop_assert!(matches!(outcome, PollOutcome::Completed(_)));
            }

            let mut expected: HashMap<ActorId, i64> = HashMap::new();
            let mut creditable = HashSet::new();
            for tx in &transactions {
                if tx.kind.is_creditable() && creditable.insert(tx.receipt.clone()) {
                    let cents = Amount::from_f64(tx.amount).unwrap().minor_units();
                    *expected.entry(tx.actor.clone()).or_default() += cents;
                }
            }

            prop_assert_eq!(receipts.count(), creditable.len());
            let mut supply = 0;
            for (actor, cents) in &expected {
                prop_assert_eq!(
                    ledger.get_balance(actor).await.unwrap(),
                    Amount::from_minor_units(*cents)
                );
                supply += cents;
            }
            prop_assert_eq!(ledger.total_supply().await.unwrap(), Amount::from_minor_units(supply));

            drop(reconciler);
            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
