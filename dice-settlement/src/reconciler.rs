//! Settlement reconciler
//!
//! Polls the transaction feed on a fixed timer and credits every new,
//! non-refund receipt to the ledger exactly once. A receipt is recorded only
//! after its credit committed, and a cycle that is still running when the
//! next tick fires causes that tick to be skipped.

use crate::{
    config::Config,
    feed::TransactionFeed,
    metrics::Metrics,
    notify::Notifier,
    receipts::ReceiptStore,
    types::{
        AppliedReceipt, CreditNotice, PollOutcome, PollReport, ReconcilerState,
        SettlementTransaction,
    },
    Error, Result,
};
use chrono::Utc;
use dice_ledger::{Amount, Ledger};
use parking_lot::Mutex as StateLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Settlement reconciler
pub struct Reconciler {
    ledger: Arc<Ledger>,
    feed: Arc<dyn TransactionFeed>,
    receipts: Arc<ReceiptStore>,
    notifier: Arc<dyn Notifier>,
    config: Config,

    /// Held for the duration of a poll cycle
    cycle: Mutex<()>,
    state: StateLock<ReconcilerState>,
    metrics: Metrics,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("feed", &self.feed.name())
            .field("state", &*self.state.lock())
            .field("receipts", &self.receipts)
            .finish()
    }
}

impl Reconciler {
    /// Create new reconciler
    pub fn new(
        ledger: Arc<Ledger>,
        feed: Arc<dyn TransactionFeed>,
        receipts: Arc<ReceiptStore>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = Metrics::new()
            .map_err(|e| Error::Other(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            ledger,
            feed,
            receipts,
            notifier,
            config,
            cycle: Mutex::new(()),
            state: StateLock::new(ReconcilerState::Idle),
            metrics,
        })
    }

    /// Current state
    pub fn state(&self) -> ReconcilerState {
        *self.state.lock()
    }

    /// Applied-receipt store
    pub fn receipts(&self) -> &ReceiptStore {
        &self.receipts
    }

    /// Reconciler metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one poll cycle unless one is already in flight
    ///
    /// Returns `Err(Error::FeedUnavailable)` when the feed could not be
    /// read; nothing is applied in that case. Failed credits do not fail the
    /// cycle, they are counted in the report and retried next time.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Poll cycle already in flight, skipping tick");
                self.metrics.record_poll("skipped");
                return Ok(PollOutcome::Skipped);
            }
        };

        *self.state.lock() = ReconcilerState::Polling;
        let started = Instant::now();
        let result = self.run_cycle().await;
        self.metrics
            .poll_duration
            .observe(started.elapsed().as_secs_f64());
        *self.state.lock() = ReconcilerState::Idle;

        match result {
            Ok(report) => {
                self.metrics.record_poll("completed");
                Ok(PollOutcome::Completed(report))
            }
            Err(e) => {
                self.metrics.record_poll("feed_unavailable");
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<PollReport> {
        let transactions = self.feed.fetch_transactions().await?;
        let mut report = PollReport {
            fetched: transactions.len(),
            ..PollReport::default()
        };

        for tx in transactions {
            if !tx.kind.is_creditable() {
                report.skipped_refunds += 1;
                continue;
            }
            if self.receipts.contains(&tx.receipt) {
                report.skipped_duplicates += 1;
                self.metrics.receipts_duplicate_total.inc();
                continue;
            }

            match self.apply(tx).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("{}", e);
                    self.metrics.credit_failures_total.inc();
                    report.failed += 1;
                }
            }
        }

        if report.applied > 0 || report.failed > 0 {
            info!(
                fetched = report.fetched,
                applied = report.applied,
                failed = report.failed,
                "Poll cycle finished"
            );
        } else {
            debug!(fetched = report.fetched, "Poll cycle finished, nothing new");
        }
        Ok(report)
    }

    /// Credit, then record, then notify
    async fn apply(&self, tx: SettlementTransaction) -> Result<()> {
        let credit_failed = |source: dice_ledger::Error| Error::CreditApplicationFailed {
            receipt: tx.receipt.clone(),
            source,
        };

        let credited = tx
            .credit_amount()
            .and_then(Amount::from_decimal)
            .map_err(credit_failed)?;
        let new_balance = self
            .ledger
            .increase_balance(&tx.actor, credited.to_decimal())
            .await
            .map_err(credit_failed)?;

        let applied = AppliedReceipt {
            receipt: tx.receipt.clone(),
            actor: tx.actor.clone(),
            amount: credited,
            applied_at: Utc::now(),
        };
        if let Err(e) = self.receipts.record(&applied) {
            // Still marked applied in memory; a restart before the next
            // successful write would credit this receipt again
            error!(receipt = %tx.receipt, "Credited receipt could not be persisted: {}", e);
        }
        self.metrics.receipts_applied_total.inc();

        info!(
            receipt = %tx.receipt,
            actor = %tx.actor,
            amount = %credited,
            "Applied settlement"
        );

        let notice = CreditNotice {
            transaction: tx,
            credited,
            new_balance,
        };
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(receipt = %notice.transaction.receipt, "Credit notification failed: {}", e);
            self.metrics.notification_failures_total.inc();
        }
        Ok(())
    }

    /// Start the poll timer
    pub fn start(self: &Arc<Self>) -> ReconcilerTask {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let reconciler = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let period = reconciler.config.poll.interval();
            let mut interval = if reconciler.config.poll.poll_on_startup {
                tokio::time::interval(period)
            } else {
                tokio::time::interval_at(tokio::time::Instant::now() + period, period)
            };
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                feed = reconciler.feed.name(),
                interval_secs = period.as_secs(),
                "Starting settlement reconciler"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = reconciler.poll_once().await {
                            warn!("Poll cycle failed, retrying next tick: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            if let Err(e) = reconciler.receipts.flush() {
                error!("Failed to flush receipt store on stop: {}", e);
            }
            info!("Settlement reconciler stopped");
        });

        ReconcilerTask { shutdown, handle }
    }
}

/// Running poll timer
#[derive(Debug)]
pub struct ReconcilerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReconcilerTask {
    /// Stop the timer, waiting for an in-flight cycle to finish and the
    /// receipt store to be flushed
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Reconciler task ended abnormally: {}", e);
        }
    }

    /// Whether the timer task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiptStoreConfig;
    use crate::types::TransactionKind;
    use async_trait::async_trait;
    use dice_ledger::ActorId;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Feed serving a fixed list, optionally failing or blocking
    #[derive(Default)]
    struct ScriptedFeed {
        transactions: parking_lot::Mutex<Vec<SettlementTransaction>>,
        unavailable: AtomicBool,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedFeed {
        fn with(transactions: Vec<SettlementTransaction>) -> Self {
            Self {
                transactions: parking_lot::Mutex::new(transactions),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TransactionFeed for ScriptedFeed {
        async fn fetch_transactions(&self) -> Result<Vec<SettlementTransaction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(Error::FeedUnavailable("connection refused".to_string()));
            }
            Ok(self.transactions.lock().clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: parking_lot::Mutex<Vec<CreditNotice>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &CreditNotice) -> Result<()> {
            self.notices.lock().push(notice.clone());
            if self.fail {
                return Err(Error::Notification("chat service down".to_string()));
            }
            Ok(())
        }
    }

    struct Harness {
        ledger: Arc<Ledger>,
        receipts: Arc<ReceiptStore>,
        _ledger_dir: TempDir,
        _receipts_dir: TempDir,
    }

    async fn open_at(ledger_dir: TempDir, receipts_dir: TempDir) -> Harness {
        let mut ledger_config = dice_ledger::Config::default();
        ledger_config.data_dir = ledger_dir.path().to_path_buf();
        ledger_config.rocksdb.sync_writes = false;

        let receipts = ReceiptStore::open(&ReceiptStoreConfig {
            data_dir: receipts_dir.path().to_path_buf(),
            sync_writes: false,
        })
        .unwrap();

        Harness {
            ledger: Arc::new(Ledger::open(ledger_config).await.unwrap()),
            receipts: Arc::new(receipts),
            _ledger_dir: ledger_dir,
            _receipts_dir: receipts_dir,
        }
    }

    async fn harness() -> Harness {
        open_at(tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap()).await
    }

    fn reconciler(
        h: &Harness,
        feed: Arc<ScriptedFeed>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<Reconciler> {
        Arc::new(
            Reconciler::new(
                h.ledger.clone(),
                feed,
                h.receipts.clone(),
                notifier,
                Config::default(),
            )
            .unwrap(),
        )
    }

    fn tx(receipt: &str, user: &str, amount: f64, kind: TransactionKind) -> SettlementTransaction {
        SettlementTransaction {
            receipt: receipt.to_string(),
            actor: ActorId::new(user),
            amount,
            kind,
            timestamp: Some(1522363427.0),
            source: Some("DTS".to_string()),
        }
    }

    fn completed(outcome: PollOutcome) -> PollReport {
        match outcome {
            PollOutcome::Completed(report) => report,
            PollOutcome::Skipped => panic!("poll was skipped"),
        }
    }

    #[tokio::test]
    async fn test_conversion_applied_once_refund_ignored() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![
            tx("r1", "u1", 10.0, TransactionKind::Conversion),
            tx("r2", "u2", 5.0, TransactionKind::Refund),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let reconciler = reconciler(&h, feed, notifier.clone());

        let first = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(first.fetched, 2);
        assert_eq!(first.applied, 1);
        assert_eq!(first.skipped_refunds, 1);

        let second = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(second.applied, 0);
        assert_eq!(second.skipped_duplicates, 1);

        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(1000)
        );
        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u2")).await.unwrap(),
            Amount::ZERO
        );
        assert!(h.receipts.contains("r1"));
        assert!(!h.receipts.contains("r2"));
        assert_eq!(notifier.notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_is_credited() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![tx(
            "r1",
            "u1",
            3.0,
            TransactionKind::Other("bonus".to_string()),
        )]));
        let reconciler = reconciler(&h, feed, Arc::new(RecordingNotifier::default()));

        let report = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(report.applied, 1);
        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(300)
        );
    }

    #[tokio::test]
    async fn test_repeated_receipt_in_one_listing_applied_once() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![
            tx("r1", "u1", 2.0, TransactionKind::Conversion),
            tx("r1", "u1", 2.0, TransactionKind::Conversion),
        ]));
        let reconciler = reconciler(&h, feed, Arc::new(RecordingNotifier::default()));

        let report = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(200)
        );
    }

    #[tokio::test]
    async fn test_sub_cent_amount_truncated() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![tx(
            "r1",
            "u1",
            10.129,
            TransactionKind::Conversion,
        )]));
        let notifier = Arc::new(RecordingNotifier::default());
        let reconciler = reconciler(&h, feed, notifier.clone());

        completed(reconciler.poll_once().await.unwrap());
        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(1012)
        );
        assert_eq!(
            h.receipts.get("r1").unwrap().unwrap().amount,
            Amount::from_minor_units(1012)
        );
        assert_eq!(notifier.notices.lock()[0].credited, Amount::from_minor_units(1012));
    }

    #[tokio::test]
    async fn test_feed_outage_applies_nothing_then_recovers() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![tx(
            "r1",
            "u1",
            10.0,
            TransactionKind::Conversion,
        )]));
        feed.unavailable.store(true, Ordering::SeqCst);
        let reconciler = reconciler(&h, feed.clone(), Arc::new(RecordingNotifier::default()));

        let result = reconciler.poll_once().await;
        assert!(matches!(result, Err(Error::FeedUnavailable(_))));
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
        assert_eq!(h.ledger.total_supply().await.unwrap(), Amount::ZERO);

        feed.unavailable.store(false, Ordering::SeqCst);
        let report = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(report.applied, 1);
    }

    #[tokio::test]
    async fn test_failed_credit_is_not_recorded_and_retried() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![
            tx("zero", "u1", 0.004, TransactionKind::Conversion),
            tx("ok", "u2", 1.0, TransactionKind::Conversion),
        ]));
        let reconciler = reconciler(&h, feed.clone(), Arc::new(RecordingNotifier::default()));

        let first = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(first.failed, 1);
        assert_eq!(first.applied, 1);
        assert!(!h.receipts.contains("zero"));

        // Still unrecorded, so the next cycle tries it again
        let second = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(second.failed, 1);
        assert_eq!(second.skipped_duplicates, 1);
        assert_eq!(reconciler.metrics().credit_failures_total.get(), 2);

        feed.transactions.lock()[0].amount = 5.0;
        let third = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(third.applied, 1);
        let fourth = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(fourth.applied, 0);
        assert_eq!(fourth.skipped_duplicates, 2);

        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(500)
        );
        assert_eq!(feed.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failing_notifier_still_records() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![tx(
            "r1",
            "u1",
            10.0,
            TransactionKind::Conversion,
        )]));
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let reconciler = reconciler(&h, feed, notifier);

        let report = completed(reconciler.poll_once().await.unwrap());
        assert_eq!(report.applied, 1);
        assert!(h.receipts.contains("r1"));
        assert_eq!(reconciler.metrics().notification_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_poll_is_skipped() {
        let h = harness().await;
        let gate = Arc::new(Notify::new());
        let feed = Arc::new(ScriptedFeed {
            transactions: parking_lot::Mutex::new(vec![tx(
                "r1",
                "u1",
                10.0,
                TransactionKind::Conversion,
            )]),
            gate: Some(gate.clone()),
            ..ScriptedFeed::default()
        });
        let reconciler = reconciler(&h, feed.clone(), Arc::new(RecordingNotifier::default()));

        let in_flight = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.poll_once().await })
        };
        while reconciler.state() != ReconcilerState::Polling {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(reconciler.poll_once().await.unwrap(), PollOutcome::Skipped);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let report = completed(in_flight.await.unwrap().unwrap());
        assert_eq!(report.applied, 1);
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[tokio::test]
    async fn test_receipts_survive_restart() {
        let ledger_dir = tempfile::tempdir().unwrap();
        let receipts_dir = tempfile::tempdir().unwrap();
        let listing = vec![tx("r1", "u1", 10.0, TransactionKind::Conversion)];

        let h = open_at(ledger_dir, receipts_dir).await;
        let first = reconciler(
            &h,
            Arc::new(ScriptedFeed::with(listing.clone())),
            Arc::new(RecordingNotifier::default()),
        );
        completed(first.poll_once().await.unwrap());

        let Harness {
            ledger,
            receipts,
            _ledger_dir,
            _receipts_dir,
        } = h;
        drop(first);
        ledger.shutdown().await.unwrap();
        drop(ledger);
        drop(receipts);

        let h = open_at(_ledger_dir, _receipts_dir).await;
        let second = reconciler(
            &h,
            Arc::new(ScriptedFeed::with(listing)),
            Arc::new(RecordingNotifier::default()),
        );
        let report = completed(second.poll_once().await.unwrap());
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(
            h.ledger.get_balance(&ActorId::new("u1")).await.unwrap(),
            Amount::from_minor_units(1000)
        );
    }

    #[tokio::test]
    async fn test_start_polls_eagerly_and_stops() {
        let h = harness().await;
        let feed = Arc::new(ScriptedFeed::with(vec![tx(
            "r1",
            "u1",
            10.0,
            TransactionKind::Conversion,
        )]));
        let reconciler = reconciler(&h, feed.clone(), Arc::new(RecordingNotifier::default()));

        let task = reconciler.start();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.receipts.contains("r1") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        task.stop().await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_cycle() {
        let h = harness().await;
        let gate = Arc::new(Notify::new());
        let feed = Arc::new(ScriptedFeed {
            transactions: parking_lot::Mutex::new(vec![tx(
                "r1",
                "u1",
                10.0,
                TransactionKind::Conversion,
            )]),
            gate: Some(gate.clone()),
            ..ScriptedFeed::default()
        });
        let reconciler = reconciler(&h, feed, Arc::new(RecordingNotifier::default()));

        let task = reconciler.start();
        while reconciler.state() != ReconcilerState::Polling {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let stopping = tokio::spawn(task.stop());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stopping.is_finished());

        gate.notify_one();
        stopping.await.unwrap();
        assert!(h.receipts.contains("r1"));
    }

    #[tokio::test]
    async fn test_receipts_durable_after_stop() {
        let ledger_dir = tempfile::tempdir().unwrap();
        let receipts_dir = tempfile::tempdir().unwrap();
        let listing = vec![tx("r1", "u1", 10.0, TransactionKind::Conversion)];

        let h = open_at(ledger_dir, receipts_dir).await;
        let running = reconciler(
            &h,
            Arc::new(ScriptedFeed::with(listing)),
            Arc::new(RecordingNotifier::default()),
        );
        let task = running.start();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.receipts.contains("r1") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        task.stop().await;

        let Harness {
            ledger,
            receipts,
            _ledger_dir,
            _receipts_dir,
        } = h;
        drop(running);
        ledger.shutdown().await.unwrap();
        drop(ledger);
        drop(receipts);

        let reopened = ReceiptStore::open(&ReceiptStoreConfig {
            data_dir: _receipts_dir.path().to_path_buf(),
            sync_writes: false,
        })
        .unwrap();
        assert!(reopened.contains("r1"));
        assert_eq!(
            reopened.get("r1").unwrap().unwrap().amount,
            Amount::from_minor_units(1000)
        );
    }
}
