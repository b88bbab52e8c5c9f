//! Refunds: single-transaction returns and the withdraw-all sweep.

use std::sync::Arc;

use anyhow::{Context, Result};
use shared::{StarTransaction, TransactionDirection, WithdrawReport};
use tracing::{info, warn};

use crate::domain::balance_service::{BalanceService, LEDGER_PAGE_SIZE};
use crate::storage::ConfigStorage;
use crate::telegram::{GiftApi, TelegramError};

pub struct RefundService<A, S> {
    api: Arc<A>,
    balance: BalanceService<A, S>,
}

impl<A: GiftApi, S: ConfigStorage> RefundService<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        let balance = BalanceService::new(Arc::clone(&api), store);
        Self { api, balance }
    }

    /// Refund one deposit by its charge id. The caller surfaces the
    /// error to the operator; nothing is retried.
    pub async fn refund(&self, user_id: i64, txn_id: &str) -> Result<(), TelegramError> {
        self.api.refund_star_payment(user_id, txn_id).await?;
        info!(txn_id, "refund completed");
        Ok(())
    }

    /// Refund every deposit on the ledger, one transaction at a time.
    ///
    /// Each refund is an independent unit: a failing one is skipped and
    /// already-completed refunds stay completed. The report's `left` is
    /// the reconciled balance after the sweep.
    pub async fn refund_all(&self, user_id: i64) -> Result<WithdrawReport> {
        let credits = self.collect_credits().await?;

        let mut refunded = 0i64;
        let mut count = 0u32;
        for txn in &credits {
            match self.api.refund_star_payment(user_id, &txn.id).await {
                Ok(()) => {
                    refunded += txn.amount;
                    count += 1;
                }
                Err(e) => warn!(txn_id = %txn.id, "refund failed, skipping: {e}"),
            }
        }

        let left = self.balance.refresh().await?;
        info!(refunded, count, left, "withdraw-all sweep finished");
        Ok(WithdrawReport {
            refunded,
            count,
            left,
        })
    }

    /// Snapshot the refundable entries before touching anything: the
    /// refunds themselves append to the ledger being paged.
    async fn collect_credits(&self) -> Result<Vec<StarTransaction>> {
        let mut credits = Vec::new();
        let mut offset = 0i64;
        loop {
            let page = self
                .api
                .star_transactions(offset, LEDGER_PAGE_SIZE)
                .await
                .context("fetching star transactions")?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as i64;
            credits.extend(
                page.into_iter()
                    .filter(|txn| txn.direction == TransactionDirection::Credit),
            );
        }
        Ok(credits)
    }
}
