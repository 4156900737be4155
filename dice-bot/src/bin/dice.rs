//! Dice service binary
//!
//! Runs the oat ledger and the Discoin settlement reconciler until Ctrl-C.

use dice_bot::{Config, LogConfig};
use dice_ledger::Ledger;
use dice_settlement::{
    DirectMessageNotifier, FanoutNotifier, HttpTransactionFeed, Notifier, ReceiptStore, Reconciler,
    TracingNotifier, WebhookNotifier,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_notifier(config: &dice_settlement::Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifications = &config.notifications;
    let mut notifier = FanoutNotifier::new().with(Arc::new(TracingNotifier::new(
        notifications.currency_plural.clone(),
    )));

    if let Some(url) = &notifications.webhook_url {
        notifier = notifier.with(Arc::new(WebhookNotifier::new(
            url.clone(),
            notifications.currency_code.clone(),
        )?));
    }

    if let Some(token) = &notifications.bot_token {
        notifier = notifier.with(Arc::new(DirectMessageNotifier::new(
            notifications.api_base.clone(),
            token.clone(),
            notifications.currency_code.clone(),
        )?));
    }

    Ok(Arc::new(notifier))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = if let Ok(config_path) = std::env::var("DICE_CONFIG") {
        Config::from_file(&config_path)?
    } else {
        Config::from_env()?
    };

    init_tracing(&config.log);
    info!("Starting {} v{}", config.bot.name, env!("CARGO_PKG_VERSION"));

    // Open ledger
    info!("Opening ledger at: {:?}", config.ledger.data_dir);
    let ledger = Arc::new(Ledger::open(config.ledger.clone()).await?);
    info!(
        users = ledger.total_users().await?,
        supply = %ledger.total_supply().await?,
        "Ledger opened"
    );

    // Settlement
    let feed = Arc::new(HttpTransactionFeed::new(config.settlement.feed.clone())?);
    let receipts = Arc::new(ReceiptStore::open(&config.settlement.receipts)?);
    let notifier = build_notifier(&config.settlement)?;
    let reconciler = Arc::new(Reconciler::new(
        ledger.clone(),
        feed,
        receipts,
        notifier,
        config.settlement.clone(),
    )?);

    let running = reconciler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    running.stop().await;
    ledger.shutdown().await?;

    info!("Dice stopped");
    Ok(())
}
