//! Configuration for the settlement reconciler

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Transaction feed
    pub feed: FeedConfig,

    /// Poll timer
    pub poll: PollConfig,

    /// Applied-receipt store
    pub receipts: ReceiptStoreConfig,

    /// Credit notifications
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "dice-settlement".to_string(),
            feed: FeedConfig::default(),
            poll: PollConfig::default(),
            receipts: ReceiptStoreConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Discoin transaction feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Transaction list endpoint
    pub url: String,

    /// Bot token sent verbatim in the `Authorization` header
    pub token: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "http://discoin.sidetrip.xyz/transactions".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Poll timer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between poll cycles (default: 5 minutes)
    pub interval_secs: u64,

    /// Run one cycle immediately on start
    pub poll_on_startup: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            poll_on_startup: true,
        }
    }
}

impl PollConfig {
    /// Poll interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Applied-receipt store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptStoreConfig {
    /// RocksDB directory
    pub data_dir: PathBuf,

    /// fsync every recorded receipt
    pub sync_writes: bool,
}

impl Default for ReceiptStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/receipts"),
            sync_writes: true,
        }
    }
}

/// Credit notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Chat webhook for the conversion log channel, disabled when unset
    pub webhook_url: Option<String>,

    /// Bot token used to direct message credited users, disabled when unset
    pub bot_token: Option<String>,

    /// Chat API base URL for direct messages
    pub api_base: String,

    /// Plural currency name used in messages
    pub currency_plural: String,

    /// Currency code shown as the conversion target
    pub currency_code: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            bot_token: None,
            api_base: "https://discord.com/api/v10".to_string(),
            currency_plural: "oats".to_string(),
            currency_code: "OAT".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(url) = std::env::var("DISCOIN_URL") {
            self.feed.url = url;
        }

        if let Ok(token) = std::env::var("DISCOIN_TOKEN") {
            self.feed.token = token;
        }

        if let Ok(interval) = std::env::var("SETTLEMENT_POLL_INTERVAL_SECS") {
            self.poll.interval_secs = interval.parse().map_err(|e| {
                crate::Error::Config(format!(
                    "Invalid SETTLEMENT_POLL_INTERVAL_SECS '{}': {}",
                    interval, e
                ))
            })?;
        }

        if let Ok(dir) = std::env::var("SETTLEMENT_RECEIPTS_DIR") {
            self.receipts.data_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("SETTLEMENT_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(token) = std::env::var("DICE_BOT_TOKEN") {
            self.notifications.bot_token = Some(token).filter(|t| !t.is_empty());
        }

        self.validate()
    }

    /// Reject values the reconciler cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(crate::Error::Config(
                "poll.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.feed.url.is_empty() {
            return Err(crate::Error::Config("feed.url must be set".to_string()));
        }
        if self.notifications.bot_token.is_some() && self.notifications.api_base.is_empty() {
            return Err(crate::Error::Config(
                "notifications.api_base must be set when bot_token is".to_string(),
            ));
        }
        Ok(())
    }
}
