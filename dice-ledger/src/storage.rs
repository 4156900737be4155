//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `balances` - Current balance per actor (key: actor id bytes)
//!
//! Balances are written only by the ledger's writer task. Every mutation is
//! committed as a single `WriteBatch`, so a transfer's two legs become
//! visible to readers together.

use crate::{
    error::{Error, Result},
    types::{ActorId, Amount, BalanceEntry, BalanceRecord},
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use std::sync::Arc;

/// Column family names
const CF_BALANCES: &str = "balances";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_BALANCES,
            Self::cf_options_balances(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened balance store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Point lookups by actor id dominate
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Balance operations

    /// Get balance record, `None` if the actor was never referenced
    pub fn get_record(&self, actor: &ActorId) -> Result<Option<BalanceRecord>> {
        let cf = self.cf_handle(CF_BALANCES)?;

        match self.db.get_cf(&cf, actor.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get balance (zero if unknown)
    pub fn get_balance(&self, actor: &ActorId) -> Result<Amount> {
        Ok(self
            .get_record(actor)?
            .map(|record| record.balance)
            .unwrap_or(Amount::ZERO))
    }

    /// Write new balances for one or more actors (atomic)
    pub fn put_balances(&self, updates: &[(&ActorId, Amount)]) -> Result<()> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let mut batch = WriteBatch::default();

        for (actor, balance) in updates {
            if balance.minor_units() < 0 {
                return Err(Error::Other(format!(
                    "refusing to persist negative balance {} for {}",
                    balance, actor
                )));
            }
            let value = bincode::serialize(&BalanceRecord::new(*balance))?;
            batch.put_cf(&cf, actor.as_bytes(), &value);
        }

        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(actors = updates.len(), "Balances committed");

        Ok(())
    }

    /// All actors with their balances, in key order
    pub fn all_balances(&self) -> Result<Vec<BalanceEntry>> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let mut entries = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let actor = String::from_utf8(key.to_vec())
                .map_err(|e| Error::Storage(format!("Non UTF-8 actor key: {}", e)))?;
            let record: BalanceRecord = bincode::deserialize(&value)?;
            entries.push(BalanceEntry {
                actor: ActorId::new(actor),
                balance: record.balance,
            });
        }

        Ok(entries)
    }

    /// Exact number of actors with a balance record
    pub fn count_actors(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Sum of every balance
    pub fn total_supply(&self) -> Result<Amount> {
        self.all_balances()?
            .into_iter()
            .try_fold(Amount::ZERO, |total, entry| {
                total
                    .checked_add(entry.balance)
                    .ok_or_else(|| Error::Storage("Total supply overflows i64".to_string()))
            })
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        tracing::debug!("Balance store flushed");
        Ok(())
    }
}
