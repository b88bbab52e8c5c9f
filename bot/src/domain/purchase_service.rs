//! Single-purchase execution with bounded retry and backoff.
//!
//! The executor never decrements the balance speculatively: either the
//! platform reports success and the cached balance drops by the price,
//! or the balance is untouched.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use shared::Recipient;
use tracing::{error, info, warn};

use crate::domain::balance_service::BalanceService;
use crate::domain::models::ConfigPatch;
use crate::storage::ConfigStorage;
use crate::telegram::{GiftApi, TelegramError};

pub const DEFAULT_RETRIES: u32 = 3;

/// How a purchase ended. Only `Purchased` touches the balance.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Purchased {
        new_balance: i64,
    },
    /// Price exceeds the reconciled balance. Deactivates the engine and
    /// is never retried.
    InsufficientFunds {
        required: i64,
        available: i64,
    },
    /// Permanent platform rejection; aborted without further attempts.
    Rejected {
        description: String,
    },
    /// Transient failures exhausted the retry budget.
    Exhausted {
        attempts: u32,
    },
}

impl PurchaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PurchaseOutcome::Purchased { .. })
    }
}

/// Backoff before the next attempt: `2^attempt` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

pub struct PurchaseService<A, S> {
    api: Arc<A>,
    store: Arc<S>,
    balance: BalanceService<A, S>,
}

impl<A, S> Clone for PurchaseService<A, S> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            balance: self.balance.clone(),
        }
    }
}

impl<A: GiftApi, S: ConfigStorage> PurchaseService<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        let balance = BalanceService::new(Arc::clone(&api), Arc::clone(&store));
        Self {
            api,
            store,
            balance,
        }
    }

    /// Buy one unit of a gift for the recipient.
    ///
    /// Reconciles the balance first; an insufficient balance fails
    /// immediately and flips `active` off. Transient send failures are
    /// retried with exponential backoff up to `retries` attempts;
    /// platform rejections abort at once.
    pub async fn purchase(
        &self,
        gift_id: &str,
        price: i64,
        recipient: &Recipient,
        retries: u32,
    ) -> Result<PurchaseOutcome> {
        let available = self.balance.refresh().await?;
        if available < price {
            warn!(
                gift_id,
                price, available, "not enough stars for purchase, deactivating engine"
            );
            self.store.merge(ConfigPatch {
                active: Some(false),
                ..ConfigPatch::default()
            })?;
            return Ok(PurchaseOutcome::InsufficientFunds {
                required: price,
                available,
            });
        }

        for attempt in 1..=retries {
            match self.api.send_gift(gift_id, recipient).await {
                Ok(()) => {
                    let new_balance = self.balance.apply_delta(-price)?;
                    info!(gift_id, price, new_balance, "gift purchased");
                    return Ok(PurchaseOutcome::Purchased { new_balance });
                }
                Err(TelegramError::Network { message }) => {
                    let delay = backoff_delay(attempt);
                    error!(
                        gift_id,
                        attempt,
                        retries,
                        "network failure during purchase: {message}; backing off {}s",
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(TelegramError::Api { description }) => {
                    error!(gift_id, "platform rejected the purchase: {description}");
                    return Ok(PurchaseOutcome::Rejected { description });
                }
            }
        }

        error!(gift_id, retries, "purchase failed after exhausting retries");
        Ok(PurchaseOutcome::Exhausted { attempts: retries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api_error, credit, gift, network_error, temp_repo, MockApi};
    use shared::Recipient;

    fn service(
        api: Arc<MockApi>,
    ) -> (
        PurchaseService<MockApi, crate::storage::JsonConfigRepository>,
        Arc<crate::storage::JsonConfigRepository>,
        tempfile::TempDir,
    ) {
        let (repo, temp_dir) = temp_repo(42);
        (
            PurchaseService::new(api, Arc::clone(&repo)),
            repo,
            temp_dir,
        )
    }

    #[tokio::test]
    async fn insufficient_funds_fails_without_any_attempt() {
        let api = Arc::new(
            MockApi::new()
                .with_gifts(vec![gift("g1", 150, 10)])
                .with_ledger(vec![credit("c1", 100)]),
        );
        let (service, repo, _temp_dir) = service(Arc::clone(&api));
        repo.merge(ConfigPatch {
            active: Some(true),
            ..ConfigPatch::default()
        })
        .unwrap();

        let outcome = service
            .purchase("g1", 150, &Recipient::User(42), DEFAULT_RETRIES)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PurchaseOutcome::InsufficientFunds {
                required: 150,
                available: 100
            }
        );
        assert_eq!(api.send_attempts(), 0);
        let config = repo.load();
        assert!(!config.active);
        assert_eq!(config.balance, 100);
    }

    #[tokio::test]
    async fn success_decrements_balance_once() {
        let api = Arc::new(
            MockApi::new()
                .with_gifts(vec![gift("g1", 150, 10)])
                .with_ledger(vec![credit("c1", 500)]),
        );
        let (service, repo, _temp_dir) = service(Arc::clone(&api));

        let outcome = service
            .purchase("g1", 150, &Recipient::User(42), DEFAULT_RETRIES)
            .await
            .unwrap();

        assert_eq!(outcome, PurchaseOutcome::Purchased { new_balance: 350 });
        assert_eq!(api.send_attempts(), 1);
        assert_eq!(repo.load().balance, 350);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_with_increasing_backoff() {
        let api = Arc::new(
            MockApi::new()
                .with_gifts(vec![gift("g1", 150, 10)])
                .with_ledger(vec![credit("c1", 500)]),
        );
        api.script_send(vec![
            Err(network_error()),
            Err(network_error()),
            Err(network_error()),
        ]);
        let (service, repo, _temp_dir) = service(Arc::clone(&api));

        let started = tokio::time::Instant::now();
        let outcome = service
            .purchase("g1", 150, &Recipient::User(42), 3)
            .await
            .unwrap();

        assert_eq!(outcome, PurchaseOutcome::Exhausted { attempts: 3 });
        assert_eq!(api.send_attempts(), 3);
        // backoff slept 2 + 4 + 8 seconds
        assert_eq!(started.elapsed(), Duration::from_secs(14));
        // balance untouched by the failed purchase
        assert_eq!(repo.load().balance, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn platform_rejection_aborts_without_using_remaining_attempts() {
        let api = Arc::new(
            MockApi::new()
                .with_gifts(vec![gift("g1", 150, 10)])
                .with_ledger(vec![credit("c1", 500)]),
        );
        api.script_send(vec![
            Err(network_error()),
            Err(api_error("STARGIFT_USAGE_LIMITED")),
        ]);
        let (service, repo, _temp_dir) = service(Arc::clone(&api));

        let outcome = service
            .purchase("g1", 150, &Recipient::User(42), 3)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PurchaseOutcome::Rejected {
                description: "STARGIFT_USAGE_LIMITED".to_string()
            }
        );
        assert_eq!(api.send_attempts(), 2);
        assert_eq!(repo.load().balance, 500);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }
}
