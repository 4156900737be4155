//! Settlement network transaction feed

use crate::{config::FeedConfig, types::SettlementTransaction, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// Source of settlement transactions
///
/// Every call returns the full list of transactions addressed to this bot,
/// including ones already applied; deduplication is the caller's job.
#[async_trait]
pub trait TransactionFeed: Send + Sync {
    /// Fetch the current transaction list
    async fn fetch_transactions(&self) -> Result<Vec<SettlementTransaction>>;

    /// Feed name for logs
    fn name(&self) -> &str;
}

/// Discoin HTTP feed
#[derive(Debug)]
pub struct HttpTransactionFeed {
    config: FeedConfig,
    client: Client,
}

impl HttpTransactionFeed {
    /// Create new HTTP feed
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TransactionFeed for HttpTransactionFeed {
    async fn fetch_transactions(&self) -> Result<Vec<SettlementTransaction>> {
        let response = self
            .client
            .get(&self.config.url)
            .header("Authorization", &self.config.token)
            .send()
            .await
            .map_err(|e| Error::FeedUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::FeedUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::FeedUnavailable(format!("Malformed feed body: {}", e)))?;

        let total = rows.len();
        let transactions: Vec<SettlementTransaction> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row.clone()) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    // Never recorded, so a fixed row is picked up later
                    warn!("Skipping malformed feed row {}: {}", row, e);
                    None
                }
            })
            .collect();

        debug!(
            "Fetched {} of {} feed rows from {}",
            transactions.len(),
            total,
            self.config.url
        );
        Ok(transactions)
    }

    fn name(&self) -> &str {
        "discoin"
    }
}
