//! `reqwest`-backed implementation of the collaborator interface.
//!
//! Network-layer failures surface as [`TelegramError::Network`]; a
//! well-formed response with `ok=false` is a platform rejection and
//! surfaces as [`TelegramError::Api`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use shared::{Gift, Recipient, StarTransaction};

use super::types::{ApiEnvelope, Update, WireGifts, WireTransactionPage};
use super::{GiftApi, TelegramError};

pub const BOT_API_BASE: &str = "https://api.telegram.org";

pub struct HttpGiftApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGiftApi {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(BOT_API_BASE, token)
    }

    /// Point the client at a non-default API host, e.g. a local test server.
    pub fn with_base_url(base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/bot{}", base.trim_end_matches('/'), token),
        }
    }

    async fn call<T, P>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| TelegramError::Network {
                message: e.to_string(),
            })?;
        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|e| TelegramError::Network {
                message: e.to_string(),
            })?;
        if !envelope.ok {
            return Err(TelegramError::Api {
                description: envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        envelope.result.ok_or_else(|| TelegramError::Api {
            description: "response missing result payload".to_string(),
        })
    }

    /// Long-poll one batch of updates for the bootstrap event loop.
    pub async fn updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Plain-text message to the operator chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GiftApi for HttpGiftApi {
    async fn send_gift(&self, gift_id: &str, recipient: &Recipient) -> Result<(), TelegramError> {
        let params = match recipient {
            Recipient::User(user_id) => json!({ "gift_id": gift_id, "user_id": user_id }),
            Recipient::Channel(handle) => {
                json!({ "gift_id": gift_id, "chat_id": format!("@{handle}") })
            }
        };
        let _: bool = self.call("sendGift", &params).await?;
        Ok(())
    }

    async fn available_gifts(&self) -> Result<Vec<Gift>, TelegramError> {
        let page: WireGifts = self.call("getAvailableGifts", &json!({})).await?;
        Ok(page.gifts.into_iter().map(Gift::from).collect())
    }

    async fn star_transactions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StarTransaction>, TelegramError> {
        let page: WireTransactionPage = self
            .call(
                "getStarTransactions",
                &json!({ "offset": offset, "limit": limit }),
            )
            .await?;
        Ok(page
            .transactions
            .into_iter()
            .map(StarTransaction::from)
            .collect())
    }

    async fn refund_star_payment(
        &self,
        user_id: i64,
        txn_id: &str,
    ) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "refundStarPayment",
                &json!({ "user_id": user_id, "telegram_payment_charge_id": txn_id }),
            )
            .await?;
        Ok(())
    }
}
