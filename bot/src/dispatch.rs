//! Inbound event dispatcher: bridges the operator's commands, wizard
//! input and keyboard callbacks to the core services.
//!
//! Replies are semantic values; rendering them into messages and
//! keyboards belongs to the presentation layer. Access control is
//! assumed applied upstream; only the operator's events arrive here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use shared::{CallbackAction, InboundEvent, Reply};
use tracing::{error, info, warn};

use crate::domain::balance_service::BalanceService;
use crate::domain::models::ConfigPatch;
use crate::domain::purchase_service::{PurchaseService, DEFAULT_RETRIES};
use crate::domain::refund_service::RefundService;
use crate::domain::wizard::{WizardOutcome, WizardSession, CANCEL_COMMAND, WITHDRAW_ALL_COMMAND};
use crate::storage::ConfigStorage;
use crate::telegram::GiftApi;

pub const START_COMMAND: &str = "/start";

/// The fixed test gift (a 15-star teddy bear) behind the `buy_bear`
/// help-menu action.
pub const TEST_GIFT_ID: &str = "5170233102089322756";
pub const TEST_GIFT_PRICE: i64 = 15;

pub struct Dispatcher<A, S> {
    store: Arc<S>,
    balance: BalanceService<A, S>,
    purchases: PurchaseService<A, S>,
    refunds: RefundService<A, S>,
    operator_id: i64,
    /// Live wizard sessions, keyed by conversation.
    sessions: Mutex<HashMap<i64, WizardSession>>,
}

impl<A: GiftApi, S: ConfigStorage> Dispatcher<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>, operator_id: i64) -> Self {
        Self {
            balance: BalanceService::new(Arc::clone(&api), Arc::clone(&store)),
            purchases: PurchaseService::new(Arc::clone(&api), Arc::clone(&store)),
            refunds: RefundService::new(api, Arc::clone(&store)),
            store,
            operator_id,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Vec<Reply> {
        match event {
            InboundEvent::Text { chat_id, text } => self.handle_text(chat_id, &text).await,
            InboundEvent::Callback { chat_id, action } => {
                self.handle_callback(chat_id, action).await
            }
        }
    }

    async fn handle_text(&self, chat_id: i64, text: &str) -> Vec<Reply> {
        let session = self.sessions.lock().unwrap().remove(&chat_id);
        if let Some(session) = session {
            return self.handle_wizard_input(chat_id, session, text).await;
        }

        match text.trim() {
            START_COMMAND => self.status_with_refresh().await,
            CANCEL_COMMAND => {
                let mut replies = vec![Reply::Cancelled];
                replies.push(self.status());
                replies
            }
            WITHDRAW_ALL_COMMAND => self.withdraw_confirm().await,
            _ => Vec::new(),
        }
    }

    async fn handle_wizard_input(
        &self,
        chat_id: i64,
        session: WizardSession,
        text: &str,
    ) -> Vec<Reply> {
        let (next, outcome) = session.handle_input(text);
        if let Some(next) = next {
            self.sessions.lock().unwrap().insert(chat_id, next);
        }

        match outcome {
            WizardOutcome::Prompt(prompt) => vec![Reply::Prompt(prompt)],
            WizardOutcome::Invalid(input_error) => vec![Reply::InvalidInput(input_error)],
            WizardOutcome::Cancelled => vec![Reply::Cancelled, self.status()],
            WizardOutcome::CommitConfig(patch) => match self.store.merge(patch) {
                Ok(config) => {
                    info!("configuration updated by wizard");
                    vec![Reply::ConfigSaved, Reply::Status(config.summary())]
                }
                Err(e) => {
                    error!("failed to persist wizard configuration: {e:#}");
                    vec![Reply::SaveFailed]
                }
            },
            WizardOutcome::RequestInvoice { amount } => vec![Reply::SendInvoice { amount }],
            WizardOutcome::RequestRefund { txn_id } => {
                match self.refunds.refund(self.operator_id, &txn_id).await {
                    Ok(()) => {
                        let mut replies = vec![Reply::RefundCompleted];
                        replies.extend(self.status_with_refresh().await);
                        replies
                    }
                    Err(e) => vec![Reply::RefundFailed {
                        reason: e.to_string(),
                    }],
                }
            }
            WizardOutcome::WithdrawAll => self.withdraw_confirm().await,
        }
    }

    async fn handle_callback(&self, chat_id: i64, action: CallbackAction) -> Vec<Reply> {
        match action {
            CallbackAction::ToggleActive => {
                let active = self.store.load().active;
                match self.store.merge(ConfigPatch {
                    active: Some(!active),
                    ..ConfigPatch::default()
                }) {
                    Ok(config) => vec![Reply::Status(config.summary())],
                    Err(e) => {
                        error!("failed to toggle purchasing: {e:#}");
                        vec![Reply::SaveFailed]
                    }
                }
            }
            CallbackAction::EditConfig => {
                let (session, prompt) = WizardSession::start_config();
                self.sessions.lock().unwrap().insert(chat_id, session);
                vec![Reply::Prompt(prompt)]
            }
            CallbackAction::ResetBought => {
                match self.store.merge(ConfigPatch {
                    bought: Some(0),
                    done: Some(false),
                    active: Some(false),
                    ..ConfigPatch::default()
                }) {
                    Ok(config) => vec![Reply::BoughtReset, Reply::Status(config.summary())],
                    Err(e) => {
                        error!("failed to reset the purchase counter: {e:#}");
                        vec![Reply::SaveFailed]
                    }
                }
            }
            CallbackAction::ShowHelp => vec![Reply::Help],
            CallbackAction::DepositMenu => {
                let (session, prompt) = WizardSession::start_deposit();
                self.sessions.lock().unwrap().insert(chat_id, session);
                vec![Reply::Prompt(prompt)]
            }
            CallbackAction::RefundMenu => {
                let (session, prompt) = WizardSession::start_refund();
                self.sessions.lock().unwrap().insert(chat_id, session);
                vec![Reply::Prompt(prompt)]
            }
            CallbackAction::WithdrawAllConfirm => {
                match self.refunds.refund_all(self.operator_id).await {
                    Ok(report) if report.count > 0 => {
                        vec![Reply::WithdrawReport(report), self.status()]
                    }
                    Ok(_) => vec![Reply::NothingToWithdraw, self.status()],
                    Err(e) => {
                        error!("withdraw-all sweep failed: {e:#}");
                        vec![Reply::RefundFailed {
                            reason: e.to_string(),
                        }]
                    }
                }
            }
            CallbackAction::WithdrawAllCancel => vec![Reply::Cancelled, self.status()],
            CallbackAction::BuyBear => self.buy_test_gift().await,
        }
    }

    /// The 15-star test purchase from the help menu; goes through the
    /// regular executor, balance checks included.
    async fn buy_test_gift(&self) -> Vec<Reply> {
        let config = self.store.load();
        let Some(recipient) = config.recipient() else {
            warn!("test purchase skipped, no recipient configured");
            return vec![Reply::TestGiftFailed];
        };
        match self
            .purchases
            .purchase(TEST_GIFT_ID, TEST_GIFT_PRICE, &recipient, DEFAULT_RETRIES)
            .await
        {
            Ok(outcome) if outcome.is_success() => {
                vec![Reply::TestGiftPurchased { recipient }]
            }
            Ok(_) => vec![Reply::TestGiftFailed],
            Err(e) => {
                error!("test purchase failed: {e:#}");
                vec![Reply::TestGiftFailed]
            }
        }
    }

    async fn withdraw_confirm(&self) -> Vec<Reply> {
        let balance = match self.balance.refresh().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("balance refresh before withdraw failed: {e:#}");
                self.store.load().balance
            }
        };
        if balance == 0 {
            vec![Reply::NothingToWithdraw, self.status()]
        } else {
            vec![Reply::WithdrawConfirm { balance }]
        }
    }

    fn status(&self) -> Reply {
        Reply::Status(self.store.load().summary())
    }

    async fn status_with_refresh(&self) -> Vec<Reply> {
        if let Err(e) = self.balance.refresh().await {
            warn!("balance refresh failed: {e:#}");
        }
        vec![self.status()]
    }

    #[cfg(test)]
    fn has_session(&self, chat_id: i64) -> bool {
        self.sessions.lock().unwrap().contains_key(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonConfigRepository;
    use crate::test_support::{credit, gift, temp_repo, MockApi};
    use shared::{ConfigSummary, InputError, Recipient, WithdrawReport, WizardPrompt};

    const OPERATOR: i64 = 42;
    const CHAT: i64 = 42;

    fn dispatcher(
        api: Arc<MockApi>,
    ) -> (
        Dispatcher<MockApi, JsonConfigRepository>,
        Arc<JsonConfigRepository>,
        tempfile::TempDir,
    ) {
        let (repo, temp_dir) = temp_repo(OPERATOR);
        (
            Dispatcher::new(api, Arc::clone(&repo), OPERATOR),
            repo,
            temp_dir,
        )
    }

    fn text(input: &str) -> InboundEvent {
        InboundEvent::Text {
            chat_id: CHAT,
            text: input.to_string(),
        }
    }

    fn callback(action: CallbackAction) -> InboundEvent {
        InboundEvent::Callback {
            chat_id: CHAT,
            action,
        }
    }

    fn status_of(reply: &Reply) -> &ConfigSummary {
        match reply {
            Reply::Status(summary) => summary,
            other => panic!("expected status reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_refreshes_balance_and_reports_status() {
        let api = Arc::new(MockApi::new().with_ledger(vec![credit("c1", 321)]));
        let (dispatcher, _repo, _temp_dir) = dispatcher(api);

        let replies = dispatcher.handle_event(text("/start")).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(status_of(&replies[0]).balance, 321);
    }

    #[tokio::test]
    async fn toggle_active_flips_the_flag() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, repo, _temp_dir) = dispatcher(api);

        let replies = dispatcher
            .handle_event(callback(CallbackAction::ToggleActive))
            .await;
        assert!(status_of(&replies[0]).active);
        assert!(repo.load().active);

        let replies = dispatcher
            .handle_event(callback(CallbackAction::ToggleActive))
            .await;
        assert!(!status_of(&replies[0]).active);
    }

    #[tokio::test]
    async fn edit_config_walks_the_wizard_and_commits_once() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, repo, _temp_dir) = dispatcher(api);
        repo.merge(ConfigPatch {
            bought: Some(4),
            done: Some(true),
            ..ConfigPatch::default()
        })
        .unwrap();

        let replies = dispatcher
            .handle_event(callback(CallbackAction::EditConfig))
            .await;
        assert_eq!(replies, vec![Reply::Prompt(WizardPrompt::MinPrice)]);

        for (input, prompt) in [
            ("100", WizardPrompt::MaxPrice),
            ("200", WizardPrompt::MinSupply),
            ("5", WizardPrompt::MaxSupply),
            ("1000", WizardPrompt::TargetCount),
            ("3", WizardPrompt::Recipient),
        ] {
            let replies = dispatcher.handle_event(text(input)).await;
            assert_eq!(replies, vec![Reply::Prompt(prompt)]);
            // nothing visible to the engine until the final step
            assert_eq!(repo.load().min_price, 5000, "premature commit on {input}");
        }

        let replies = dispatcher.handle_event(text("@deals")).await;
        assert_eq!(replies[0], Reply::ConfigSaved);

        let config = repo.load();
        assert_eq!(config.min_price, 100);
        assert_eq!(config.max_price, 200);
        assert_eq!(config.min_supply, 5);
        assert_eq!(config.max_supply, 1000);
        assert_eq!(config.target_count, 3);
        assert_eq!(config.target_channel.as_deref(), Some("deals"));
        assert_eq!(config.target_user_id, None);
        // the commit reset the run
        assert_eq!(config.bought, 0);
        assert!(!config.done);
        assert!(!config.active);
        assert!(!dispatcher.has_session(CHAT));
    }

    #[tokio::test]
    async fn invalid_wizard_input_reprompts_and_keeps_the_session() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, repo, _temp_dir) = dispatcher(api);

        dispatcher
            .handle_event(callback(CallbackAction::EditConfig))
            .await;
        dispatcher.handle_event(text("100")).await;

        let replies = dispatcher.handle_event(text("50")).await;
        assert_eq!(
            replies,
            vec![Reply::InvalidInput(InputError::MaxPriceBelowMin)]
        );
        assert!(dispatcher.has_session(CHAT));
        assert_eq!(repo.load().min_price, 5000);
    }

    #[tokio::test]
    async fn cancel_clears_the_session_and_config_is_untouched() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, repo, _temp_dir) = dispatcher(api);

        dispatcher
            .handle_event(callback(CallbackAction::EditConfig))
            .await;
        dispatcher.handle_event(text("100")).await;

        let replies = dispatcher.handle_event(text("/cancel")).await;
        assert_eq!(replies[0], Reply::Cancelled);
        assert!(!dispatcher.has_session(CHAT));
        assert_eq!(repo.load().min_price, 5000);

        // follow-up free text is no longer wizard input
        let replies = dispatcher.handle_event(text("200")).await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn deposit_wizard_requests_an_invoice() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, _repo, _temp_dir) = dispatcher(api);

        let replies = dispatcher
            .handle_event(callback(CallbackAction::DepositMenu))
            .await;
        assert_eq!(replies, vec![Reply::Prompt(WizardPrompt::DepositAmount)]);

        let replies = dispatcher.handle_event(text("5000")).await;
        assert_eq!(replies, vec![Reply::SendInvoice { amount: 5000 }]);
        assert!(!dispatcher.has_session(CHAT));
    }

    #[tokio::test]
    async fn refund_wizard_refunds_and_reports_status() {
        let api = Arc::new(MockApi::new().with_ledger(vec![credit("c1", 100)]));
        let (dispatcher, _repo, _temp_dir) = dispatcher(Arc::clone(&api));

        dispatcher
            .handle_event(callback(CallbackAction::RefundMenu))
            .await;
        let replies = dispatcher.handle_event(text("c1")).await;

        assert_eq!(replies[0], Reply::RefundCompleted);
        assert_eq!(*api.refunded.lock().unwrap(), vec!["c1"]);
        // refreshed after the refund: deposit minus its refund debit
        assert_eq!(status_of(&replies[1]).balance, 0);
    }

    #[tokio::test]
    async fn withdraw_all_asks_for_confirmation_then_sweeps() {
        let api = Arc::new(MockApi::new().with_ledger(vec![credit("c1", 100)]));
        let (dispatcher, _repo, _temp_dir) = dispatcher(Arc::clone(&api));

        let replies = dispatcher.handle_event(text("/withdraw_all")).await;
        assert_eq!(replies, vec![Reply::WithdrawConfirm { balance: 100 }]);

        let replies = dispatcher
            .handle_event(callback(CallbackAction::WithdrawAllConfirm))
            .await;
        assert_eq!(
            replies[0],
            Reply::WithdrawReport(WithdrawReport {
                refunded: 100,
                count: 1,
                left: 0
            })
        );
    }

    #[tokio::test]
    async fn withdraw_all_with_empty_balance_reports_nothing() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, _repo, _temp_dir) = dispatcher(api);

        let replies = dispatcher.handle_event(text("/withdraw_all")).await;
        assert_eq!(replies[0], Reply::NothingToWithdraw);
    }

    #[tokio::test]
    async fn reset_bought_clears_the_run_counters() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, repo, _temp_dir) = dispatcher(api);
        repo.merge(ConfigPatch {
            bought: Some(5),
            done: Some(true),
            active: Some(true),
            ..ConfigPatch::default()
        })
        .unwrap();

        let replies = dispatcher
            .handle_event(callback(CallbackAction::ResetBought))
            .await;
        assert_eq!(replies[0], Reply::BoughtReset);

        let config = repo.load();
        assert_eq!(config.bought, 0);
        assert!(!config.done);
        assert!(!config.active);
    }

    #[tokio::test]
    async fn buy_bear_goes_through_the_executor() {
        let api = Arc::new(
            MockApi::new()
                .with_gifts(vec![gift(TEST_GIFT_ID, TEST_GIFT_PRICE, 500_000)])
                .with_ledger(vec![credit("c1", 100)]),
        );
        let (dispatcher, repo, _temp_dir) = dispatcher(Arc::clone(&api));

        let replies = dispatcher
            .handle_event(callback(CallbackAction::BuyBear))
            .await;
        assert_eq!(
            replies,
            vec![Reply::TestGiftPurchased {
                recipient: Recipient::User(OPERATOR)
            }]
        );
        assert_eq!(repo.load().balance, 85);

        let sent = api.sent.lock().unwrap();
        assert_eq!(sent[0].0, TEST_GIFT_ID);
    }

    #[tokio::test]
    async fn buy_bear_with_empty_balance_fails_cleanly() {
        let api = Arc::new(MockApi::new());
        let (dispatcher, _repo, _temp_dir) = dispatcher(api);

        let replies = dispatcher
            .handle_event(callback(CallbackAction::BuyBear))
            .await;
        assert_eq!(replies, vec![Reply::TestGiftFailed]);
    }
}
