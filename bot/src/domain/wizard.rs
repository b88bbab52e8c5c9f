//! The configuration wizard: a strictly linear input state machine.
//!
//! One state per field, driven by inbound text. Constraint violations
//! re-prompt the same state without touching the collected draft, and
//! nothing is committed until the final recipient step succeeds, so the
//! engine never observes partial progress. Two single-state wizards
//! (deposit amount, refund transaction id) share the same skeleton and
//! bypass the configuration entirely.

use shared::{InputError, Recipient, WizardPrompt};

use crate::domain::models::ConfigPatch;

/// Recognized at every state; clears the session, config untouched.
pub const CANCEL_COMMAND: &str = "/cancel";
/// Recognized inside the refund wizard; sweeps the whole balance.
pub const WITHDRAW_ALL_COMMAND: &str = "/withdraw_all";

pub const MIN_DEPOSIT: i64 = 1;
pub const MAX_DEPOSIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    MinPrice,
    MaxPrice,
    MinSupply,
    MaxSupply,
    TargetCount,
    Recipient,
}

/// Fields collected so far. Only ever written on a successful step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDraft {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_supply: Option<i64>,
    pub max_supply: Option<i64>,
    pub target_count: Option<i64>,
}

/// A transient per-conversation wizard session.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardSession {
    Config { step: ConfigStep, draft: ConfigDraft },
    DepositAmount,
    RefundId,
}

/// The effect of feeding one inbound message into a session.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardOutcome {
    /// Show this prompt next.
    Prompt(WizardPrompt),
    /// Input rejected; the same state is re-prompted.
    Invalid(InputError),
    Cancelled,
    /// Terminal: commit the collected fields in one merged write.
    CommitConfig(ConfigPatch),
    /// Terminal: ask the payment collaborator for a deposit invoice.
    RequestInvoice { amount: i64 },
    /// Terminal: refund one transaction by charge id.
    RequestRefund { txn_id: String },
    /// Terminal: start the withdraw-all confirmation flow.
    WithdrawAll,
}

impl WizardSession {
    pub fn start_config() -> (Self, WizardPrompt) {
        (
            Self::Config {
                step: ConfigStep::MinPrice,
                draft: ConfigDraft::default(),
            },
            WizardPrompt::MinPrice,
        )
    }

    pub fn start_deposit() -> (Self, WizardPrompt) {
        (Self::DepositAmount, WizardPrompt::DepositAmount)
    }

    pub fn start_refund() -> (Self, WizardPrompt) {
        (Self::RefundId, WizardPrompt::RefundTransactionId)
    }

    /// Feed one message. Returns the session to keep (`None` when the
    /// wizard finished or was cancelled) and what happened.
    pub fn handle_input(self, input: &str) -> (Option<Self>, WizardOutcome) {
        let input = input.trim();
        if input.eq_ignore_ascii_case(CANCEL_COMMAND) {
            return (None, WizardOutcome::Cancelled);
        }
        match self {
            Self::Config { step, draft } => handle_config_step(step, draft, input),
            Self::DepositAmount => match parse_positive(input) {
                Some(amount) if (MIN_DEPOSIT..=MAX_DEPOSIT).contains(&amount) => {
                    (None, WizardOutcome::RequestInvoice { amount })
                }
                _ => (
                    Some(Self::DepositAmount),
                    WizardOutcome::Invalid(InputError::DepositOutOfRange),
                ),
            },
            Self::RefundId => {
                if input.eq_ignore_ascii_case(WITHDRAW_ALL_COMMAND) {
                    return (None, WizardOutcome::WithdrawAll);
                }
                if input.is_empty() {
                    return (
                        Some(Self::RefundId),
                        WizardOutcome::Invalid(InputError::EmptyTransactionId),
                    );
                }
                (
                    None,
                    WizardOutcome::RequestRefund {
                        txn_id: input.to_string(),
                    },
                )
            }
        }
    }
}

fn handle_config_step(
    step: ConfigStep,
    mut draft: ConfigDraft,
    input: &str,
) -> (Option<WizardSession>, WizardOutcome) {
    let reprompt = |step: ConfigStep, draft: ConfigDraft, error: InputError| {
        (
            Some(WizardSession::Config { step, draft }),
            WizardOutcome::Invalid(error),
        )
    };
    let advance = |step: ConfigStep, draft: ConfigDraft, prompt: WizardPrompt| {
        (
            Some(WizardSession::Config { step, draft }),
            WizardOutcome::Prompt(prompt),
        )
    };

    match step {
        ConfigStep::MinPrice => match parse_positive(input) {
            Some(value) => {
                draft.min_price = Some(value);
                advance(ConfigStep::MaxPrice, draft, WizardPrompt::MaxPrice)
            }
            None => reprompt(step, draft, InputError::NotAPositiveNumber),
        },
        ConfigStep::MaxPrice => match parse_positive(input) {
            Some(value) => {
                if draft.min_price.is_some_and(|min| value < min) {
                    return reprompt(step, draft, InputError::MaxPriceBelowMin);
                }
                draft.max_price = Some(value);
                advance(ConfigStep::MinSupply, draft, WizardPrompt::MinSupply)
            }
            None => reprompt(step, draft, InputError::NotAPositiveNumber),
        },
        ConfigStep::MinSupply => match parse_positive(input) {
            Some(value) => {
                draft.min_supply = Some(value);
                advance(ConfigStep::MaxSupply, draft, WizardPrompt::MaxSupply)
            }
            None => reprompt(step, draft, InputError::NotAPositiveNumber),
        },
        ConfigStep::MaxSupply => match parse_positive(input) {
            Some(value) => {
                if draft.min_supply.is_some_and(|min| value < min) {
                    return reprompt(step, draft, InputError::MaxSupplyBelowMin);
                }
                draft.max_supply = Some(value);
                advance(ConfigStep::TargetCount, draft, WizardPrompt::TargetCount)
            }
            None => reprompt(step, draft, InputError::NotAPositiveNumber),
        },
        ConfigStep::TargetCount => match parse_positive(input) {
            Some(value) => {
                draft.target_count = Some(value);
                advance(ConfigStep::Recipient, draft, WizardPrompt::Recipient)
            }
            None => reprompt(step, draft, InputError::NotAPositiveNumber),
        },
        ConfigStep::Recipient => match Recipient::parse(input) {
            Some(recipient) => (None, WizardOutcome::CommitConfig(commit_patch(draft, recipient))),
            None => reprompt(step, draft, InputError::InvalidRecipient),
        },
    }
}

/// The single merged write that makes the new configuration visible.
/// Also resets the run so the engine starts fresh once re-activated.
fn commit_patch(draft: ConfigDraft, recipient: Recipient) -> ConfigPatch {
    let (target_user_id, target_channel) = match recipient {
        Recipient::User(id) => (Some(id), None),
        Recipient::Channel(handle) => (None, Some(handle)),
    };
    ConfigPatch {
        min_price: draft.min_price,
        max_price: draft.max_price,
        min_supply: draft.min_supply,
        max_supply: draft.max_supply,
        target_count: draft.target_count,
        target_user_id: Some(target_user_id),
        target_channel: Some(target_channel),
        bought: Some(0),
        active: Some(false),
        done: Some(false),
        ..ConfigPatch::default()
    }
}

fn parse_positive(input: &str) -> Option<i64> {
    input.parse::<i64>().ok().filter(|value| *value > 0)
}
