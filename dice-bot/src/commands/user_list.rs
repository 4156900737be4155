//! `user-list` (owner only)

use super::{CommandContext, CommandResponse, User};
use crate::Result;
use tracing::{debug, warn};

/// List every ledger actor with their balance
pub async fn run(ctx: &CommandContext, author: &User) -> Result<CommandResponse> {
    if !ctx.config.is_owner(author.id.as_str()) {
        warn!(user = %author.id, "Owner-only command refused");
        return Ok(CommandResponse::Text(
            "\u{274c} Only the bot owner(s) may use this command.".to_string(),
        ));
    }

    let users = ctx.ledger.all_users().await?;
    let total = ctx.ledger.total_users().await?;
    debug!(listed = users.len(), total, "Listing users");

    let mut lines: Vec<String> = users
        .iter()
        .map(|entry| format!("`{}` ({} {})", entry.actor, entry.balance, ctx.config.currency_plural))
        .collect();
    lines.push(format!(
        "{} users in total. {} users were listed.",
        total,
        users.len()
    ));

    Ok(CommandResponse::Text(format!("\u{1f464} {}", lines.join("\n"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_owner_sees_all_users() {
        let (ctx, _dir) = context().await;
        for id in ["a", "b", "c"] {
            ctx.ledger
                .increase_balance(&dice_ledger::ActorId::new(id), Decimal::new(150, 2))
                .await
                .unwrap();
        }

        let owner = User::human(ctx.config.owner_ids[0].clone());
        let response = run(&ctx, &owner).await.unwrap();
        let text = response.text().unwrap();
        assert!(text.contains("`b` (1.50 oats)"));
        assert!(text.ends_with("3 users in total. 3 users were listed."));
    }

    #[tokio::test]
    async fn test_non_owner_refused() {
        let (ctx, _dir) = context().await;
        let response = run(&ctx, &User::human("intruder")).await.unwrap();
        assert!(response.text().unwrap().starts_with("\u{274c}"));
    }
}
