//! Credit notifications
//!
//! Notifications are best-effort. The reconciler logs a failed notification
//! and moves on; the credit and the receipt record stand.

use crate::{types::CreditNotice, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives a notice for every applied settlement
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a credit notice
    async fn notify(&self, notice: &CreditNotice) -> Result<()>;
}

/// Writes credit notices to the structured log
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    currency_plural: String,
}

impl TracingNotifier {
    /// Create new tracing notifier
    pub fn new(currency_plural: impl Into<String>) -> Self {
        Self {
            currency_plural: currency_plural.into(),
        }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &CreditNotice) -> Result<()> {
        info!(
            actor = %notice.transaction.actor,
            receipt = %notice.transaction.receipt,
            source = notice.transaction.source.as_deref().unwrap_or("unknown"),
            new_balance = %notice.new_balance,
            "Conversion received: {} {}",
            notice.credited,
            self.currency_plural
        );
        Ok(())
    }
}

/// Posts a "Conversion Received" embed to a chat webhook
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    currency_code: String,
    client: Client,
}

impl WebhookNotifier {
    /// Create new webhook notifier
    pub fn new(url: impl Into<String>, currency_code: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            currency_code: currency_code.into(),
            client,
        })
    }

    fn payload(&self, notice: &CreditNotice) -> serde_json::Value {
        json!({ "embeds": [conversion_embed(notice, &self.currency_code)] })
    }
}

/// Build the "Conversion Received" embed shown to the user and the log channel
fn conversion_embed(notice: &CreditNotice, currency_code: &str) -> serde_json::Value {
    let tx = &notice.transaction;
    let source = tx.source.as_deref().unwrap_or("?");
    let mut embed = json!({
        "title": "Conversion Received",
        "description": format!("<@{}>", tx.actor),
        "fields": [
            {
                "name": "Amount",
                "value": format!("{} \u{27a1} {} {}", source, notice.credited, currency_code),
            },
            {
                "name": "Receipt",
                "value": tx.receipt,
            },
        ],
    });
    if let Some(at) = tx.occurred_at() {
        embed["timestamp"] = json!(at.to_rfc3339());
    }
    embed
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &CreditNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(notice))
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "Webhook returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// Sends the "Conversion Received" embed to the credited user as a direct message
///
/// Opens (or reuses) the DM channel with `POST /users/@me/channels`, then posts
/// the embed to `/channels/{id}/messages`.
#[derive(Debug)]
pub struct DirectMessageNotifier {
    api_base: String,
    bot_token: String,
    currency_code: String,
    client: Client,
}

#[derive(Deserialize)]
struct DmChannel {
    id: String,
}

impl DirectMessageNotifier {
    /// Create new direct message notifier against the chat API at `api_base`
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        currency_code: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            currency_code: currency_code.into(),
            client,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "{} returned HTTP {}",
                path,
                response.status().as_u16()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Notifier for DirectMessageNotifier {
    async fn notify(&self, notice: &CreditNotice) -> Result<()> {
        let recipient = notice.transaction.actor.as_str();
        let channel: DmChannel = self
            .post("/users/@me/channels", &json!({ "recipient_id": recipient }))
            .await?
            .json()
            .await
            .map_err(|e| Error::Notification(format!("Malformed DM channel: {}", e)))?;

        debug!(recipient, channel = %channel.id, "Sending conversion notice");
        self.post(
            &format!("/channels/{}/messages", channel.id),
            &json!({ "embeds": [conversion_embed(notice, &self.currency_code)] }),
        )
        .await?;
        Ok(())
    }
}

/// Delivers each notice to every inner notifier
#[derive(Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutNotifier")
            .field("notifiers", &self.notifiers.len())
            .finish()
    }
}

impl FanoutNotifier {
    /// Create empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notifier
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, notice: &CreditNotice) -> Result<()> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(notice).await {
                warn!(receipt = %notice.transaction.receipt, "Notifier failed: {}", e);
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Notification(failures.join("; ")))
        }
    }
}
