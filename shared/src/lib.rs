use serde::{Deserialize, Serialize};
use std::fmt;

/// A purchasable gift from the platform catalog.
///
/// Ephemeral: fetched fresh each engine cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    /// Price in stars.
    pub price: i64,
    /// Total issued supply. Absent for unlimited gifts.
    pub supply: Option<i64>,
    /// Units still available for purchase, when the platform reports it.
    pub remaining: Option<i64>,
    /// Opaque sticker reference used by the platform when rendering the gift.
    pub sticker_file_id: String,
}

/// Whether a ledger entry adds to or subtracts from the star balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionDirection {
    /// Incoming payment (the transaction carries a source).
    Credit,
    /// Outgoing spend (no source on the transaction).
    Debit,
}

/// One entry of the remote star-transaction ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarTransaction {
    /// Platform-assigned charge id; needed to refund a deposit.
    pub id: String,
    /// Absolute amount in stars; the direction carries the sign.
    pub amount: i64,
    pub direction: TransactionDirection,
}

impl StarTransaction {
    /// Signed contribution of this entry to the balance fold.
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            TransactionDirection::Credit => self.amount,
            TransactionDirection::Debit => -self.amount,
        }
    }
}

/// Destination of a purchased gift: a user account or a channel, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    User(i64),
    /// Channel username without the leading `@`.
    Channel(String),
}

impl Recipient {
    /// Parse free-text recipient input.
    ///
    /// A leading `@` selects the channel form (the sentinel is stripped),
    /// all-digit input selects the user-id form, anything else is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(handle) = input.strip_prefix('@') {
            if handle.is_empty() {
                return None;
            }
            return Some(Recipient::Channel(handle.to_string()));
        }
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return input.parse::<i64>().ok().map(Recipient::User);
        }
        None
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "{id}"),
            Recipient::Channel(handle) => write!(f, "@{handle}"),
        }
    }
}

/// How an acquisition run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The configured number of gifts was purchased.
    Completed,
    /// Purchasing stopped early, typically on an exhausted balance.
    Stalled,
}

/// One line of a run summary: a gift id with how many units were bought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedLine {
    pub gift_id: String,
    pub unit_price: i64,
    pub count: i64,
}

/// Itemized report emitted to the operator when a run completes or stalls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub lines: Vec<PurchasedLine>,
    pub total_spent: i64,
    /// Purchases completed this run, including earlier cycles.
    pub bought: i64,
    pub target_count: i64,
    pub recipient: Option<Recipient>,
}

/// Inline-keyboard callback identifiers understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackAction {
    ToggleActive,
    EditConfig,
    ResetBought,
    ShowHelp,
    DepositMenu,
    RefundMenu,
    WithdrawAllConfirm,
    WithdrawAllCancel,
    BuyBear,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "toggle_active" => Some(Self::ToggleActive),
            "edit_config" => Some(Self::EditConfig),
            "reset_bought" => Some(Self::ResetBought),
            "show_help" => Some(Self::ShowHelp),
            "deposit_menu" => Some(Self::DepositMenu),
            "refund_menu" => Some(Self::RefundMenu),
            "withdraw_all_confirm" => Some(Self::WithdrawAllConfirm),
            "withdraw_all_cancel" => Some(Self::WithdrawAllCancel),
            "buy_bear" => Some(Self::BuyBear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToggleActive => "toggle_active",
            Self::EditConfig => "edit_config",
            Self::ResetBought => "reset_bought",
            Self::ShowHelp => "show_help",
            Self::DepositMenu => "deposit_menu",
            Self::RefundMenu => "refund_menu",
            Self::WithdrawAllConfirm => "withdraw_all_confirm",
            Self::WithdrawAllCancel => "withdraw_all_cancel",
            Self::BuyBear => "buy_bear",
        }
    }
}

/// An event delivered from the transport layer to the dispatcher.
///
/// Access control is applied upstream: only the authorized operator's
/// events reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    Text { chat_id: i64, text: String },
    Callback { chat_id: i64, action: CallbackAction },
}

/// The wizard step an operator is being asked to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardPrompt {
    MinPrice,
    MaxPrice,
    MinSupply,
    MaxSupply,
    TargetCount,
    Recipient,
    DepositAmount,
    RefundTransactionId,
}

/// Why a wizard input was rejected. Always recovered by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputError {
    NotAPositiveNumber,
    MaxPriceBelowMin,
    MaxSupplyBelowMin,
    InvalidRecipient,
    DepositOutOfRange,
    EmptyTransactionId,
}

/// Snapshot of the persisted configuration for status display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub active: bool,
    pub min_price: i64,
    pub max_price: i64,
    pub min_supply: i64,
    pub max_supply: i64,
    pub bought: i64,
    pub target_count: i64,
    pub recipient: Option<Recipient>,
    pub balance: i64,
}

/// Result of refunding every deposit on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawReport {
    /// Stars returned to the operator.
    pub refunded: i64,
    /// Number of transactions refunded.
    pub count: u32,
    /// Stars still on the balance after the sweep.
    pub left: i64,
}

/// Semantic reply produced by the dispatcher; the UI layer owns rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Prompt(WizardPrompt),
    InvalidInput(InputError),
    Cancelled,
    ConfigSaved,
    /// The configuration could not be persisted; nothing was applied.
    SaveFailed,
    BoughtReset,
    Status(ConfigSummary),
    Help,
    /// Ask the payment collaborator to issue a deposit invoice.
    SendInvoice { amount: i64 },
    RefundCompleted,
    RefundFailed { reason: String },
    WithdrawConfirm { balance: i64 },
    WithdrawReport(WithdrawReport),
    NothingToWithdraw,
    TestGiftPurchased { recipient: Recipient },
    TestGiftFailed,
}
