//! Dice game math
//!
//! A round multiplies the wager by a chosen multiplier. The player wins when
//! a roll in `[0, max_multiplier)` does not exceed the win chance
//! `(100 - house_edge) / multiplier`.

use crate::config::BotConfig;
use dice_ledger::Amount;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Arguments a round cannot be played with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Wager below the configured minimum or not a positive amount
    #[error("The minimum wager is {min}.")]
    WagerTooSmall {
        /// Configured minimum
        min: Decimal,
    },

    /// Multiplier outside the configured range
    #[error("The multiplier must be between {min} and {max}.")]
    MultiplierOutOfRange {
        /// Configured minimum
        min: Decimal,
        /// Configured maximum
        max: Decimal,
    },
}

/// Outcome of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRound {
    /// Wager
    pub wager: Amount,
    /// Multiplier, two decimals
    pub multiplier: Decimal,
    /// Roll, two decimals
    pub roll: Decimal,
    /// Win chance in percent (unrounded)
    pub win_chance: Decimal,
    /// Whether the player won
    pub won: bool,
    /// Profit if won (`wager * multiplier - wager`), two decimals
    pub profit: Decimal,
}

fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(Amount::SCALE, RoundingStrategy::ToZero)
}

/// Normalize a wager and check it against the minimum
pub fn normalize_wager(raw: Decimal, config: &BotConfig) -> Result<Amount, GameError> {
    let too_small = GameError::WagerTooSmall {
        min: config.min_wager,
    };
    let wager = Amount::from_decimal(raw).map_err(|_| too_small.clone())?;
    if wager.to_decimal() < config.min_wager {
        return Err(too_small);
    }
    Ok(wager)
}

/// Truncate a multiplier to two decimals and check the configured range
pub fn normalize_multiplier(raw: Decimal, config: &BotConfig) -> Result<Decimal, GameError> {
    let multiplier = truncate(raw);
    if multiplier < config.min_multiplier || multiplier > config.max_multiplier {
        return Err(GameError::MultiplierOutOfRange {
            min: config.min_multiplier,
            max: config.max_multiplier,
        });
    }
    Ok(multiplier)
}

/// Win chance in percent for a multiplier
pub fn win_chance(house_edge_percent: Decimal, multiplier: Decimal) -> Decimal {
    (Decimal::ONE_HUNDRED - house_edge_percent) / multiplier
}

/// Roll a number in `[0, max)` with two decimals
pub fn roll<R: Rng>(rng: &mut R, max: Decimal) -> Decimal {
    let hundredths = (truncate(max) * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap_or(0)
        .max(1);
    Decimal::new(rng.gen_range(0..hundredths), Amount::SCALE)
}

/// Settle a round against a given roll
pub fn play(wager: Amount, multiplier: Decimal, roll: Decimal, config: &BotConfig) -> GameRound {
    let win_chance = win_chance(config.house_edge_percent, multiplier);
    let wager_value = wager.to_decimal();

    GameRound {
        wager,
        multiplier,
        roll,
        win_chance,
        won: roll <= win_chance,
        profit: truncate(wager_value * multiplier - wager_value),
    }
}

/// Validate arguments, roll, and settle a round
pub fn simulate<R: Rng>(
    rng: &mut R,
    wager: Decimal,
    multiplier: Decimal,
    config: &BotConfig,
) -> Result<GameRound, GameError> {
    let wager = normalize_wager(wager, config)?;
    let multiplier = normalize_multiplier(multiplier, config)?;
    let roll = roll(rng, config.max_multiplier);
    Ok(play(wager, multiplier, roll, config))
}
