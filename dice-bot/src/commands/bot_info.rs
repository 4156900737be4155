//! `bot-info`

use super::{CommandContext, CommandResponse, Embed};
use std::time::Duration;

/// Name, version, uptime and repository link
pub fn run(ctx: &CommandContext) -> CommandResponse {
    let config = &ctx.config;
    let uptime = humanize(ctx.started_at.elapsed());

    let embed = Embed {
        title: config.name.clone(),
        url: Some(config.repository_url.clone()),
        description: Some(format!(
            "{} is a game bot based off the game bustadice, and a member of the Discoin \
             network for converting currencies between bots.",
            config.name
        )),
        color: Some(0x4caf50),
        ..Embed::default()
    }
    .field("\u{1f552} Uptime", uptime, true)
    .field(
        format!("\u{1f3b2} {} version", config.name),
        format!("v{}", env!("CARGO_PKG_VERSION")),
        true,
    )
    .field(
        "\u{1f527} GitHub",
        format!(
            "{} is open source! [See the repository]({}).",
            config.name, config.repository_url
        ),
        true,
    );

    CommandResponse::Embed(embed)
}

/// Coarse human-readable duration ("a few seconds", "3 minutes", "2 days")
pub fn humanize(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let (value, unit) = match seconds {
        0..=44 => return "a few seconds".to_string(),
        45..=89 => return "a minute".to_string(),
        90..=2_699 => ((seconds + 30) / 60, "minute"),
        2_700..=5_399 => return "an hour".to_string(),
        5_400..=79_199 => ((seconds + 1_800) / 3_600, "hour"),
        79_200..=129_599 => return "a day".to_string(),
        _ => ((seconds + 43_200) / 86_400, "day"),
    };
    format!("{} {}s", value, unit)
}
