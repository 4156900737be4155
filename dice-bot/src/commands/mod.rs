//! Command handlers
//!
//! Handlers receive already-parsed arguments and an invoking user, and
//! return a [`CommandResponse`] for the chat layer to render. Refusals are
//! ordinary responses; only ledger faults come back as `Err`.

pub mod bot_info;
pub mod simulate_game;
pub mod transfer;
pub mod user_list;

use crate::config::BotConfig;
use dice_ledger::{ActorId, Ledger};
use std::sync::Arc;
use std::time::Instant;

/// A chat user as seen by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id
    pub id: ActorId,
    /// Whether the account is a bot
    pub bot: bool,
}

impl User {
    /// Human account
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            bot: false,
        }
    }

    /// Bot account
    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            bot: true,
        }
    }
}

/// Embed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    /// Field name
    pub name: String,
    /// Field value
    pub value: String,
    /// Render side by side with neighbours
    pub inline: bool,
}

/// Rich response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    /// Title
    pub title: String,
    /// Title link
    pub url: Option<String>,
    /// Body text
    pub description: Option<String>,
    /// Sidebar colour
    pub color: Option<u32>,
    /// Fields
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// Add a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Look up a field value by name
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// What a handler answers with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// Plain text reply
    Text(String),
    /// Embed reply
    Embed(Embed),
}

impl CommandResponse {
    /// Text reply, `None` for embeds
    pub fn text(&self) -> Option<&str> {
        match self {
            CommandResponse::Text(text) => Some(text),
            CommandResponse::Embed(_) => None,
        }
    }

    /// Embed reply, `None` for text
    pub fn embed(&self) -> Option<&Embed> {
        match self {
            CommandResponse::Embed(embed) => Some(embed),
            CommandResponse::Text(_) => None,
        }
    }
}

/// Shared state handlers run against
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Ledger
    pub ledger: Arc<Ledger>,
    /// Bot settings
    pub config: Arc<BotConfig>,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl CommandContext {
    /// Create new context, rejecting settings the game math cannot use
    pub fn new(ledger: Arc<Ledger>, config: BotConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            config: Arc::new(config),
            started_at: Instant::now(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Context over a fresh ledger in a temp directory
    pub async fn context() -> (CommandContext, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dice_ledger::Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;

        let ledger = Arc::new(Ledger::open(config).await.unwrap());
        let bot = BotConfig {
            bot_id: "388191157869477888".to_string(),
            ..BotConfig::default()
        };
        (CommandContext::new(ledger, bot).unwrap(), dir)
    }
}
