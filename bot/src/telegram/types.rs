//! Wire shapes of the Bot API payloads this bot touches, plus their
//! conversions into the domain DTOs from `shared`.

use serde::Deserialize;
use shared::{Gift, StarTransaction, TransactionDirection};

/// Standard Bot API response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSticker {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireGift {
    pub id: String,
    pub sticker: WireSticker,
    /// Price of the gift in stars.
    pub star_count: i64,
    /// Total supply; absent for unlimited gifts.
    pub total_count: Option<i64>,
    pub remaining_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WireGifts {
    pub gifts: Vec<WireGift>,
}

impl From<WireGift> for Gift {
    fn from(wire: WireGift) -> Self {
        Gift {
            id: wire.id,
            price: wire.star_count,
            supply: wire.total_count,
            remaining: wire.remaining_count,
            sticker_file_id: wire.sticker.file_id,
        }
    }
}

/// A ledger entry as the platform reports it. The presence of `source`
/// marks an incoming payment; its shape is otherwise opaque to us.
#[derive(Debug, Clone, Deserialize)]
pub struct WireStarTransaction {
    pub id: String,
    pub amount: i64,
    pub source: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WireTransactionPage {
    pub transactions: Vec<WireStarTransaction>,
}

impl From<WireStarTransaction> for StarTransaction {
    fn from(wire: WireStarTransaction) -> Self {
        let direction = if wire.source.is_some() {
            TransactionDirection::Credit
        } else {
            TransactionDirection::Debit
        };
        StarTransaction {
            id: wire.id,
            amount: wire.amount,
            direction,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub from: Option<UserRef>,
    pub chat: ChatRef,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: UserRef,
    pub message: Option<IncomingMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
    pub callback_query: Option<CallbackQuery>,
}
