//! Service configuration
//!
//! One TOML file covers the whole process; the `[ledger]` and `[settlement]`
//! tables are the library crates' own configs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging
    pub log: LogConfig,

    /// Game and command settings
    pub bot: BotConfig,

    /// Ledger
    pub ledger: dice_ledger::Config,

    /// Settlement reconciler
    pub settlement: dice_settlement::Config,
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Game and command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name
    pub name: String,

    /// The bot's own user id; the only bot account that may receive transfers
    pub bot_id: String,

    /// Users allowed to run owner-only commands
    pub owner_ids: Vec<String>,

    /// Smallest wager or transfer
    pub min_wager: Decimal,

    /// Smallest multiplier
    pub min_multiplier: Decimal,

    /// Largest multiplier, also the upper bound of the roll
    pub max_multiplier: Decimal,

    /// House edge in percent
    pub house_edge_percent: Decimal,

    /// Singular currency name
    pub currency_singular: String,

    /// Plural currency name
    pub currency_plural: String,

    /// Source repository
    pub repository_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Dice".to_string(),
            bot_id: String::new(),
            owner_ids: vec!["395509201402855424".to_string()],
            min_wager: Decimal::ONE,
            min_multiplier: Decimal::new(101, 2),
            max_multiplier: Decimal::new(100, 0),
            house_edge_percent: Decimal::ONE,
            currency_singular: "oat".to_string(),
            currency_plural: "oats".to_string(),
            repository_url: "https://github.com/PizzaFox/dice".to_string(),
        }
    }
}

impl BotConfig {
    /// Whether the user may run owner-only commands
    pub fn is_owner(&self, user: &str) -> bool {
        self.owner_ids.iter().any(|owner| owner == user)
    }

    /// Reject settings the game math cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_wager <= Decimal::ZERO {
            return Err(crate::Error::Config("bot.min_wager must be positive".to_string()));
        }
        if self.min_multiplier <= Decimal::ONE || self.min_multiplier > self.max_multiplier {
            return Err(crate::Error::Config(format!(
                "bot multiplier range [{}, {}] is invalid",
                self.min_multiplier, self.max_multiplier
            )));
        }
        if self.house_edge_percent < Decimal::ZERO || self.house_edge_percent >= Decimal::ONE_HUNDRED
        {
            return Err(crate::Error::Config(format!(
                "bot.house_edge_percent {} must be in [0, 100)",
                self.house_edge_percent
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.apply_env()?;
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
        if let Ok(bot_id) = std::env::var("DICE_BOT_ID") {
            self.bot.bot_id = bot_id;
        }

        if let Ok(owners) = std::env::var("DICE_OWNER_IDS") {
            self.bot.owner_ids = owners
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(json) = std::env::var("DICE_LOG_JSON") {
            self.log.json = json.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid DICE_LOG_JSON '{}': {}", json, e))
            })?;
        }

        self.ledger.apply_env()?;
        self.settlement.apply_env()?;
        self.bot.validate()
    }
}
