//! `simulate-game <wager> <multiplier>`
//!
//! Plays a round without touching the ledger.

use super::{CommandContext, CommandResponse, Embed};
use crate::game::{self, GameRound};
use rand::Rng;
use rust_decimal::Decimal;

const WIN_COLOR: u32 = 0x4caf50;
const LOSS_COLOR: u32 = 0xf44334;

/// Simulate a round with the thread-local RNG
pub fn run(ctx: &CommandContext, wager: Decimal, multiplier: Decimal) -> CommandResponse {
    run_with(ctx, &mut rand::thread_rng(), wager, multiplier)
}

/// Simulate a round with the given RNG
pub fn run_with<R: Rng>(
    ctx: &CommandContext,
    rng: &mut R,
    wager: Decimal,
    multiplier: Decimal,
) -> CommandResponse {
    match game::simulate(rng, wager, multiplier, &ctx.config) {
        Ok(round) => CommandResponse::Embed(render(&round, &ctx.config.currency_plural)),
        Err(e) => CommandResponse::Text(format!("\u{274c} {}", e)),
    }
}

fn render(round: &GameRound, plural: &str) -> Embed {
    let (color, description) = if round.won {
        (
            WIN_COLOR,
            format!("Your profit would have been `{:.2}` {}!", round.profit, plural),
        )
    } else {
        (
            LOSS_COLOR,
            format!("You would have lost `{}` {}.", round.wager, plural),
        )
    };

    Embed {
        title: format!("**{} \u{1f1fd} {}**", round.wager, round.multiplier),
        description: Some(description),
        color: Some(color),
        ..Embed::default()
    }
    .field("\u{1f522} Random Number Result", round.roll.to_string(), true)
    .field("\u{1f4ca} Win Chance", format!("{:.2}%", round.win_chance.round_dp(2)), true)
    .field("\u{1f4b5} Wager", round.wager.to_string(), true)
    .field("\u{1f1fd} Multiplier", round.multiplier.to_string(), true)
}
