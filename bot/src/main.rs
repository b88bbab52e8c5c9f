use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use shared::{CallbackAction, InboundEvent, RunSummary};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gifts_bot::config::AppConfig;
use gifts_bot::dispatch::Dispatcher;
use gifts_bot::domain::engine::{AcquisitionEngine, EngineNotifier};
use gifts_bot::render;
use gifts_bot::storage::{ConfigStorage, JsonConfigRepository};
use gifts_bot::telegram::http::HttpGiftApi;
use gifts_bot::telegram::types::Update;

const UPDATES_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Delivers run reports to the operator chat.
struct OperatorNotifier {
    api: Arc<HttpGiftApi>,
    operator_id: i64,
}

impl OperatorNotifier {
    async fn deliver(&self, summary: &RunSummary) {
        let text = render::summary_text(summary);
        if let Err(e) = self.api.send_message(self.operator_id, &text).await {
            error!("failed to deliver run summary: {e}");
        }
    }
}

#[async_trait]
impl EngineNotifier for OperatorNotifier {
    async fn run_completed(&self, summary: &RunSummary) {
        self.deliver(summary).await;
    }

    async fn run_stalled(&self, summary: &RunSummary) {
        self.deliver(summary).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(app.log_filter.clone()))
        .init();
    info!("starting gifts-bot");

    let api = Arc::new(HttpGiftApi::new(&app.bot_token));
    let store = Arc::new(JsonConfigRepository::new(&app.config_path, app.operator_id));
    let config = store.load();
    info!(
        path = %app.config_path.display(),
        active = config.active,
        "configuration loaded"
    );

    let notifier = OperatorNotifier {
        api: Arc::clone(&api),
        operator_id: app.operator_id,
    };
    let engine = AcquisitionEngine::new(Arc::clone(&api), Arc::clone(&store), notifier);
    tokio::spawn(async move { engine.run().await });

    let dispatcher = Dispatcher::new(Arc::clone(&api), store, app.operator_id);

    let mut offset = 0i64;
    loop {
        let updates = match api.updates(offset, UPDATES_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("failed to fetch updates: {e}");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(event) = inbound_event(&api, app.operator_id, update).await else {
                continue;
            };
            let chat_id = match &event {
                InboundEvent::Text { chat_id, .. } | InboundEvent::Callback { chat_id, .. } => {
                    *chat_id
                }
            };
            for reply in dispatcher.handle_event(event).await {
                let text = render::reply_text(&reply);
                if let Err(e) = api.send_message(chat_id, &text).await {
                    error!("failed to send reply: {e}");
                }
            }
        }
    }
}

/// Map one raw update to a dispatcher event. Callback queries are
/// acknowledged here; anything not from the operator is dropped.
async fn inbound_event(
    api: &HttpGiftApi,
    operator_id: i64,
    update: Update,
) -> Option<InboundEvent> {
    if let Some(message) = update.message {
        if message.from.as_ref().map(|user| user.id) != Some(operator_id) {
            return None;
        }
        let text = message.text?;
        return Some(InboundEvent::Text {
            chat_id: message.chat.id,
            text,
        });
    }
    if let Some(callback) = update.callback_query {
        if let Err(e) = api.answer_callback_query(&callback.id).await {
            warn!("failed to answer callback query: {e}");
        }
        if callback.from.id != operator_id {
            return None;
        }
        let action = CallbackAction::parse(callback.data.as_deref().unwrap_or_default())?;
        let chat_id = callback
            .message
            .map(|message| message.chat.id)
            .unwrap_or(operator_id);
        return Some(InboundEvent::Callback { chat_id, action });
    }
    None
}
