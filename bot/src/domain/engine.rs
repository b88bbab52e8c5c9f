//! The acquisition engine: an orchestrating loop over catalog filtering
//! and purchase execution.
//!
//! All run state lives in the persisted configuration (`active`, `done`,
//! `bought`), so the process is stateless across restarts. One cycle is
//! a deterministic unit: tests single-step [`AcquisitionEngine::run_cycle`]
//! instead of relying on wall-clock polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use shared::{RunOutcome, RunSummary};
use tracing::{error, info, warn};

use crate::domain::balance_service::BalanceService;
use crate::domain::catalog::eligible_gifts;
use crate::domain::models::ConfigPatch;
use crate::domain::purchase_service::{PurchaseService, DEFAULT_RETRIES};
use crate::domain::summary::build_summary;
use crate::storage::ConfigStorage;
use crate::telegram::GiftApi;

/// Poll interval between engine cycles.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(100);
/// Pause between consecutive purchases, to respect rate limits.
pub const PURCHASE_PAUSE: Duration = Duration::from_millis(100);

/// Receives run reports; the UI collaborator owns their rendering.
#[async_trait]
pub trait EngineNotifier: Send + Sync {
    async fn run_completed(&self, summary: &RunSummary);
    async fn run_stalled(&self, summary: &RunSummary);
}

#[async_trait]
impl<T: EngineNotifier + ?Sized> EngineNotifier for Arc<T> {
    async fn run_completed(&self, summary: &RunSummary) {
        (**self).run_completed(summary).await;
    }

    async fn run_stalled(&self, summary: &RunSummary) {
        (**self).run_stalled(summary).await;
    }
}

/// What a single engine cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Purchasing is switched off, or the run already completed.
    Idle,
    /// Nothing in the catalog matched the configured bounds.
    NoMatches,
    /// The target count was reached; the run is over.
    Completed(RunSummary),
    /// A purchase failed before the target was reached; purchasing is
    /// deactivated but the run may resume once the balance recovers.
    Stalled(RunSummary),
}

pub struct AcquisitionEngine<A, S, N> {
    api: Arc<A>,
    store: Arc<S>,
    purchases: PurchaseService<A, S>,
    balance: BalanceService<A, S>,
    notifier: N,
}

impl<A: GiftApi, S: ConfigStorage, N: EngineNotifier> AcquisitionEngine<A, S, N> {
    pub fn new(api: Arc<A>, store: Arc<S>, notifier: N) -> Self {
        let purchases = PurchaseService::new(Arc::clone(&api), Arc::clone(&store));
        let balance = BalanceService::new(Arc::clone(&api), Arc::clone(&store));
        Self {
            api,
            store,
            purchases,
            balance,
            notifier,
        }
    }

    /// Run forever. A failing cycle is logged and the loop moves on to
    /// the next one; nothing inside a cycle may terminate the process.
    pub async fn run(&self) {
        if let Err(e) = self.balance.refresh().await {
            warn!("initial balance refresh failed: {e:#}");
        }
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("engine cycle failed: {e:#}");
            }
            tokio::time::sleep(CYCLE_INTERVAL).await;
        }
    }

    /// Execute one cycle: load the configuration, filter the catalog,
    /// buy while the target allows, then evaluate completion or stall.
    /// Completion takes precedence once `bought >= target_count`.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut config = self.store.load();
        if !config.active || config.done {
            return Ok(CycleOutcome::Idle);
        }

        let catalog = self.api.available_gifts().await?;
        let eligible = eligible_gifts(
            &catalog,
            config.min_price,
            config.max_price,
            config.min_supply,
            config.max_supply,
        );

        // One entry per successful purchase; feeds the run summary.
        let mut ledger: Vec<(String, i64)> = Vec::new();
        let mut halted = false;
        'gifts: for gift in &eligible {
            info!(
                gift_id = %gift.id,
                price = gift.price,
                supply = gift.supply.unwrap_or(0),
                "eligible gift"
            );
            while config.bought < config.target_count {
                let Some(recipient) = config.recipient() else {
                    warn!("no recipient configured, stopping purchases");
                    halted = true;
                    break 'gifts;
                };
                let outcome = self
                    .purchases
                    .purchase(&gift.id, gift.price, &recipient, DEFAULT_RETRIES)
                    .await?;
                if !outcome.is_success() {
                    halted = true;
                    break 'gifts;
                }
                config.bought += 1;
                ledger.push((gift.id.clone(), gift.price));
                self.store.merge(ConfigPatch {
                    bought: Some(config.bought),
                    ..ConfigPatch::default()
                })?;
                tokio::time::sleep(PURCHASE_PAUSE).await;
            }
            if config.bought >= config.target_count {
                break;
            }
        }

        if config.bought >= config.target_count {
            let config = self.store.merge(ConfigPatch {
                active: Some(false),
                done: Some(true),
                ..ConfigPatch::default()
            })?;
            let summary = build_summary(RunOutcome::Completed, &ledger, &config);
            info!(
                bought = config.bought,
                total_spent = summary.total_spent,
                "run completed"
            );
            self.notifier.run_completed(&summary).await;
            if let Err(e) = self.balance.refresh().await {
                warn!("balance refresh after completion failed: {e:#}");
            }
            return Ok(CycleOutcome::Completed(summary));
        }

        if halted {
            let config = self.store.merge(ConfigPatch {
                active: Some(false),
                ..ConfigPatch::default()
            })?;
            let summary = build_summary(RunOutcome::Stalled, &ledger, &config);
            warn!(
                bought = config.bought,
                target_count = config.target_count,
                "run stalled before reaching the target"
            );
            self.notifier.run_stalled(&summary).await;
            if let Err(e) = self.balance.refresh().await {
                warn!("balance refresh after stall failed: {e:#}");
            }
            return Ok(CycleOutcome::Stalled(summary));
        }

        Ok(CycleOutcome::NoMatches)
    }
}
