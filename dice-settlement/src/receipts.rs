//! Applied-receipt store
//!
//! # Column Families
//!
//! - `receipts` - One entry per applied receipt (key: receipt bytes,
//!   value: bincode `AppliedReceipt`)
//!
//! The full key set is mirrored in memory on open so that the hot path
//! (`contains`) never touches disk. The store only grows.

use crate::{config::ReceiptStoreConfig, types::AppliedReceipt, Error, Result};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

const CF_RECEIPTS: &str = "receipts";

/// Durable set of receipts that produced a ledger credit
pub struct ReceiptStore {
    db: Arc<DB>,
    applied: RwLock<HashSet<String>>,
    sync_writes: bool,
}

impl std::fmt::Debug for ReceiptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptStore")
            .field("path", &self.db.path())
            .field("applied", &self.applied.read().len())
            .finish()
    }
}

impl ReceiptStore {
    /// Open or create the store and load every recorded receipt
    pub fn open(config: &ReceiptStoreConfig) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_RECEIPTS,
            Self::cf_options_receipts(),
        )];
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let mut applied = HashSet::new();
        {
            let cf = db
                .cf_handle(CF_RECEIPTS)
                .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_RECEIPTS)))?;
            for item in db.iterator_cf(&cf, IteratorMode::Start) {
                let (key, _) = item?;
                applied.insert(String::from_utf8_lossy(&key).into_owned());
            }
        }

        info!(path = ?path, applied = applied.len(), "Opened receipt store");

        Ok(Self {
            db: Arc::new(db),
            applied: RwLock::new(applied),
            sync_writes: config.sync_writes,
        })
    }

    fn cf_options_receipts() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    /// Whether the receipt has already been applied
    pub fn contains(&self, receipt: &str) -> bool {
        self.applied.read().contains(receipt)
    }

    /// Record an applied receipt
    ///
    /// The in-memory set is updated first, so a failed durable write never
    /// lets this process apply the same receipt twice.
    pub fn record(&self, applied: &AppliedReceipt) -> Result<()> {
        self.applied.write().insert(applied.receipt.clone());

        let cf = self
            .db
            .cf_handle(CF_RECEIPTS)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_RECEIPTS)))?;
        let value = bincode::serialize(applied)?;

        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db
            .put_cf_opt(&cf, applied.receipt.as_bytes(), value, &opts)?;
        Ok(())
    }

    /// Look up the stored record for a receipt
    pub fn get(&self, receipt: &str) -> Result<Option<AppliedReceipt>> {
        let cf = self
            .db
            .cf_handle(CF_RECEIPTS)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_RECEIPTS)))?;

        match self.db.get_cf(&cf, receipt.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Number of applied receipts
    pub fn count(&self) -> usize {
        self.applied.read().len()
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dice_ledger::{ActorId, Amount};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ReceiptStoreConfig {
        ReceiptStoreConfig {
            data_dir: dir.path().to_path_buf(),
            sync_writes: false,
        }
    }

    fn applied(receipt: &str) -> AppliedReceipt {
        AppliedReceipt {
            receipt: receipt.to_string(),
            actor: ActorId::new("u1"),
            amount: Amount::from_minor_units(1000),
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(&config_in(&dir)).unwrap();

        assert!(!store.contains("r1"));
        store.record(&applied("r1")).unwrap();
        assert!(store.contains("r1"));
        assert_eq!(store.count(), 1);

        let stored = store.get("r1").unwrap().unwrap();
        assert_eq!(stored.amount, Amount::from_minor_units(1000));
        assert!(store.get("r2").unwrap().is_none());
    }

    #[test]
    fn test_receipts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ReceiptStore::open(&config_in(&dir)).unwrap();
            store.record(&applied("r1")).unwrap();
            store.record(&applied("r2")).unwrap();
            store.flush().unwrap();
        }

        let store = ReceiptStore::open(&config_in(&dir)).unwrap();
        assert_eq!(store.count(), 2);
        assert!(store.contains("r1"));
        assert!(store.contains("r2"));
    }

    #[test]
    fn test_recording_twice_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(&config_in(&dir)).unwrap();
        store.record(&applied("r1")).unwrap();
        store.record(&applied("r1")).unwrap();
        assert_eq!(store.count(), 1);
    }
}
