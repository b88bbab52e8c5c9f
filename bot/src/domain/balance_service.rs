//! Balance reconciliation against the remote star-transaction ledger.
//!
//! The cached `balance` field in the configuration is never
//! authoritative: [`BalanceService::refresh`] recomputes it from the
//! full paginated ledger, and [`BalanceService::apply_delta`] is only a
//! fast local adjustment between reconciliations.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::models::ConfigPatch;
use crate::storage::ConfigStorage;
use crate::telegram::GiftApi;

/// Fixed ledger page size; the remote history ends at the first empty page.
pub const LEDGER_PAGE_SIZE: i64 = 100;

pub struct BalanceService<A, S> {
    api: Arc<A>,
    store: Arc<S>,
}

impl<A, S> Clone for BalanceService<A, S> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
        }
    }
}

impl<A: GiftApi, S: ConfigStorage> BalanceService<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        Self { api, store }
    }

    /// Recompute the balance from the full transaction history: credits
    /// minus debits, folded page by page. The result is merged into the
    /// stored configuration and returned.
    ///
    /// Call this whenever the cached balance may be stale: on engine
    /// start, after deposits and after refunds.
    pub async fn refresh(&self) -> Result<i64> {
        let mut offset = 0i64;
        let mut balance = 0i64;
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
            for txn in &page {
                balance += txn.signed_amount();
            }
        }
        let updated = self.store.merge(ConfigPatch {
            balance: Some(balance),
            ..ConfigPatch::default()
        })?;
        debug!(balance = updated.balance, "balance reconciled from ledger");
        Ok(updated.balance)
    }

    /// Optimistic local adjustment after a purchase, clamped at zero.
    /// Does not consult the remote ledger.
    pub fn apply_delta(&self, delta: i64) -> Result<i64> {
        let current = self.store.load();
        let next = (current.balance + delta).max(0);
        let updated = self.store.merge(ConfigPatch {
            balance: Some(next),
            ..ConfigPatch::default()
        })?;
        Ok(updated.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{credit, debit, temp_repo, MockApi};

    #[tokio::test]
    async fn refresh_folds_credits_minus_debits() {
        let api = Arc::new(MockApi::new().with_ledger(vec![
            credit("c1", 300),
            debit("d1", 120),
            credit("c2", 50),
        ]));
        let (repo, _temp_dir) = temp_repo(42);
        let service = BalanceService::new(api, Arc::clone(&repo));

        let balance = service.refresh().await.unwrap();
        assert_eq!(balance, 230);
        assert_eq!(repo.load().balance, 230);
    }

    #[tokio::test]
    async fn refresh_is_independent_of_pagination_boundaries() {
        // 215 entries: three pages at the fixed page size
        let mut ledger = Vec::new();
        for i in 0..205 {
            ledger.push(credit(&format!("c{i}"), 2));
        }
        for i in 0..10 {
            ledger.push(debit(&format!("d{i}"), 7));
        }
        let api = Arc::new(MockApi::new().with_ledger(ledger));
        let (repo, _temp_dir) = temp_repo(42);
        let service = BalanceService::new(api, repo);

        let balance = service.refresh().await.unwrap();
        assert_eq!(balance, 205 * 2 - 10 * 7);
    }

    #[tokio::test]
    async fn refresh_of_empty_ledger_is_zero() {
        let api = Arc::new(MockApi::new());
        let (repo, _temp_dir) = temp_repo(42);
        let service = BalanceService::new(api, Arc::clone(&repo));

        assert_eq!(service.refresh().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn apply_delta_clamps_at_zero() {
        let api = Arc::new(MockApi::new());
        let (repo, _temp_dir) = temp_repo(42);
        let service = BalanceService::new(api, Arc::clone(&repo));

        repo.merge(ConfigPatch {
            balance: Some(100),
            ..ConfigPatch::default()
        })
        .unwrap();

        assert_eq!(service.apply_delta(-250).unwrap(), 0);
        assert_eq!(service.apply_delta(50).unwrap(), 50);
        assert_eq!(repo.load().balance, 50);
    }
}
