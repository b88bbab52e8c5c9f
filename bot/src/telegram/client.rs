use async_trait::async_trait;
use shared::{Gift, Recipient, StarTransaction};
use thiserror::Error;

/// Error taxonomy for collaborator calls.
///
/// `Network` failures are transient and worth retrying with backoff;
/// `Api` failures are platform rejections and must not be retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("network error talking to Telegram: {message}")]
    Network { message: String },
    #[error("Telegram rejected the call: {description}")]
    Api { description: String },
}

impl TelegramError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TelegramError::Network { .. })
    }
}

/// The commerce surface of the platform, as seen by the domain layer.
///
/// Everything behind this trait is a black box: message rendering,
/// polling and payment invoices are handled elsewhere.
#[async_trait]
pub trait GiftApi: Send + Sync {
    /// Send one unit of a gift to the recipient. Success means the
    /// platform accepted the purchase and charged the balance.
    async fn send_gift(&self, gift_id: &str, recipient: &Recipient) -> Result<(), TelegramError>;

    /// The current gift catalog.
    async fn available_gifts(&self) -> Result<Vec<Gift>, TelegramError>;

    /// One page of the star-transaction ledger. An empty page marks the
    /// end of the history.
    async fn star_transactions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StarTransaction>, TelegramError>;

    /// Refund a single deposit by its charge id.
    async fn refund_star_payment(&self, user_id: i64, txn_id: &str)
        -> Result<(), TelegramError>;
}
