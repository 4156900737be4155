//! `transfer <amount> <user>`

use super::{CommandContext, CommandResponse, User};
use crate::game;
use crate::Result;
use rust_decimal::Decimal;
use tracing::info;

/// Move oats from the invoking user to another user
pub async fn run(
    ctx: &CommandContext,
    author: &User,
    amount: Decimal,
    recipient: &User,
) -> Result<CommandResponse> {
    let config = &ctx.config;
    let plural = &config.currency_plural;

    let amount = match game::normalize_wager(amount, config) {
        Ok(amount) => amount,
        Err(e) => return Ok(refuse(e.to_string())),
    };

    if author.id == recipient.id {
        return Ok(refuse("You can't send money to yourself.".to_string()));
    }

    if recipient.bot && recipient.id.as_str() != config.bot_id {
        return Ok(refuse(format!("You can't send {} to bots.", plural)));
    }

    let balance = ctx.ledger.get_balance(&author.id).await?;
    if amount > balance {
        return Ok(insufficient(amount, balance, plural));
    }

    match ctx
        .ledger
        .transfer(&author.id, &recipient.id, amount.to_decimal())
        .await
    {
        Ok(receipt) => {
            info!(
                from = %author.id,
                to = %recipient.id,
                amount = %amount,
                "Transfer command completed"
            );
            Ok(CommandResponse::Text(format!(
                "\u{2705} Sent `{}` {} to <@{}>. Your balance is `{}`.",
                amount, plural, recipient.id, receipt.from_balance
            )))
        }
        // Balance moved between the check and the commit
        Err(dice_ledger::Error::InsufficientFunds { balance, .. }) => {
            Ok(insufficient(amount, balance, plural))
        }
        Err(e) => Err(e.into()),
    }
}

fn refuse(message: String) -> CommandResponse {
    CommandResponse::Text(format!("\u{274c} {}", message))
}

fn insufficient(
    amount: dice_ledger::Amount,
    balance: dice_ledger::Amount,
    plural: &str,
) -> CommandResponse {
    refuse(format!(
        "You need to have at least `{}` {}. Your balance is `{}`.",
        amount, plural, balance
    ))
}
