//! Plain-text rendering of replies and run summaries for the bundled
//! transport loop.
//!
//! Formatting is presentation only; the semantic content of every
//! message lives in the `shared` types.

use shared::{ConfigSummary, InputError, Recipient, Reply, RunOutcome, RunSummary, WizardPrompt};

pub fn reply_text(reply: &Reply) -> String {
    match reply {
        Reply::Prompt(prompt) => prompt_text(prompt).to_string(),
        Reply::InvalidInput(input_error) => input_error_text(input_error).to_string(),
        Reply::Cancelled => "Action cancelled.".to_string(),
        Reply::ConfigSaved => {
            "Configuration updated. Purchasing stays off until you re-enable it.".to_string()
        }
        Reply::SaveFailed => "Could not save the configuration, nothing was changed.".to_string(),
        Reply::BoughtReset => "Purchase counter reset.".to_string(),
        Reply::Status(summary) => status_text(summary),
        Reply::Help => help_text(),
        Reply::SendInvoice { amount } => {
            format!("Deposit requested: an invoice for {amount} stars is on its way.")
        }
        Reply::RefundCompleted => "Refund completed.".to_string(),
        Reply::RefundFailed { reason } => format!("Refund failed: {reason}"),
        Reply::WithdrawConfirm { balance } => {
            format!("Withdraw all {balance} stars? Confirm or cancel below.")
        }
        Reply::WithdrawReport(report) => {
            let mut text = format!(
                "Refunded {} stars across {} transactions.",
                report.refunded, report.count
            );
            if report.left > 0 {
                text.push_str(&format!("\n{} stars are still on the balance.", report.left));
            }
            text
        }
        Reply::NothingToWithdraw => "No stars to withdraw.".to_string(),
        Reply::TestGiftPurchased { recipient } => {
            format!("Test gift purchased for 15 stars. Recipient: {recipient}.")
        }
        Reply::TestGiftFailed => {
            "Could not buy the 15-star test gift. Top up the balance.".to_string()
        }
    }
}

pub fn summary_text(summary: &RunSummary) -> String {
    let mut lines = Vec::new();
    match summary.outcome {
        RunOutcome::Completed => lines.push("All gifts purchased!".to_string()),
        RunOutcome::Stalled => {
            lines.push("Purchasing stopped. Top up the balance.".to_string())
        }
    }
    for line in &summary.lines {
        lines.push(format!(
            "id {} | {} stars x {}",
            line.gift_id, line.unit_price, line.count
        ));
    }
    lines.push(format!("Total spent: {} stars", summary.total_spent));
    lines.push(format!(
        "Bought: {} of {}",
        summary.bought, summary.target_count
    ));
    lines.push(format!(
        "Recipient: {}",
        recipient_text(&summary.recipient)
    ));
    lines.join("\n")
}

fn status_text(summary: &ConfigSummary) -> String {
    let state = if summary.active { "active" } else { "paused" };
    format!(
        "Status: {state}\n\
         Price: {} - {} stars\n\
         Supply: {} - {}\n\
         Bought: {} / {}\n\
         Recipient: {}\n\
         Balance: {} stars",
        summary.min_price,
        summary.max_price,
        summary.min_supply,
        summary.max_supply,
        summary.bought,
        summary.target_count,
        recipient_text(&summary.recipient),
        summary.balance,
    )
}

fn help_text() -> String {
    [
        "Controls:",
        "on/off - start or stop purchasing",
        "edit - reconfigure price, supply, count and recipient step by step",
        "reset - clear the purchased counter",
        "deposit - top up the star balance",
        "refund - return stars by transaction id (/withdraw_all sweeps everything)",
        "",
        "After editing the configuration, purchasing stays off until re-enabled.",
        "A user recipient must have started this bot; a channel is given as @username.",
    ]
    .join("\n")
}

fn prompt_text(prompt: &WizardPrompt) -> &'static str {
    match prompt {
        WizardPrompt::MinPrice => "Minimum gift price, e.g. 5000\n\n/cancel - abort",
        WizardPrompt::MaxPrice => "Maximum gift price, e.g. 10000\n\n/cancel - abort",
        WizardPrompt::MinSupply => "Minimum gift supply, e.g. 1000\n\n/cancel - abort",
        WizardPrompt::MaxSupply => "Maximum gift supply, e.g. 10000\n\n/cancel - abort",
        WizardPrompt::TargetCount => "Number of gifts to buy, e.g. 5\n\n/cancel - abort",
        WizardPrompt::Recipient => {
            "Recipient: a user id (digits) or a channel username starting with @\n\n/cancel - abort"
        }
        WizardPrompt::DepositAmount => {
            "Deposit amount in stars, between 1 and 10000\n\n/cancel - abort"
        }
        WizardPrompt::RefundTransactionId => {
            "Transaction id to refund\n\n/withdraw_all - sweep the whole balance\n/cancel - abort"
        }
    }
}

fn input_error_text(input_error: &InputError) -> &'static str {
    match input_error {
        InputError::NotAPositiveNumber => "Enter a positive number. Try again.",
        InputError::MaxPriceBelowMin => "The maximum price cannot be below the minimum.",
        InputError::MaxSupplyBelowMin => "The maximum supply cannot be below the minimum.",
        InputError::InvalidRecipient => {
            "Enter a numeric user id, or a channel username starting with @. Try again."
        }
        InputError::DepositOutOfRange => "Enter a number between 1 and 10000.",
        InputError::EmptyTransactionId => "Enter the transaction id shown on the payment message.",
    }
}

fn recipient_text(recipient: &Option<Recipient>) -> String {
    match recipient {
        Some(recipient) => recipient.to_string(),
        None => "not configured".to_string(),
    }
}
