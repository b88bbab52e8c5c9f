//! Test doubles shared by the domain service tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::{Gift, Recipient, RunSummary, StarTransaction, TransactionDirection};
use tempfile::TempDir;

use crate::domain::engine::EngineNotifier;
use crate::storage::JsonConfigRepository;
use crate::telegram::{GiftApi, TelegramError};

pub fn gift(id: &str, price: i64, supply: i64) -> Gift {
    Gift {
        id: id.to_string(),
        price,
        supply: Some(supply),
        remaining: None,
        sticker_file_id: format!("sticker-{id}"),
    }
}

pub fn credit(id: &str, amount: i64) -> StarTransaction {
    StarTransaction {
        id: id.to_string(),
        amount,
        direction: TransactionDirection::Credit,
    }
}

pub fn debit(id: &str, amount: i64) -> StarTransaction {
    StarTransaction {
        id: id.to_string(),
        amount,
        direction: TransactionDirection::Debit,
    }
}

/// A file-backed repository in a fresh temp dir. Keep the `TempDir`
/// alive for the duration of the test.
pub fn temp_repo(operator_id: i64) -> (Arc<JsonConfigRepository>, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let repo = Arc::new(JsonConfigRepository::new(
        temp_dir.path().join("config.json"),
        operator_id,
    ));
    (repo, temp_dir)
}

/// Scriptable collaborator double.
///
/// `send_gift` succeeds unless a scripted error is queued; successful
/// sends append a matching debit to the ledger, like the platform would.
#[derive(Default)]
pub struct MockApi {
    pub gifts: Mutex<Vec<Gift>>,
    pub ledger: Mutex<Vec<StarTransaction>>,
    pub send_script: Mutex<VecDeque<Result<(), TelegramError>>>,
    pub sent: Mutex<Vec<(String, Recipient)>>,
    pub send_attempts: Mutex<u32>,
    pub refund_script: Mutex<VecDeque<Result<(), TelegramError>>>,
    pub refunded: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gifts(self, gifts: Vec<Gift>) -> Self {
        *self.gifts.lock().unwrap() = gifts;
        self
    }

    pub fn with_ledger(self, ledger: Vec<StarTransaction>) -> Self {
        *self.ledger.lock().unwrap() = ledger;
        self
    }

    pub fn script_send(&self, results: Vec<Result<(), TelegramError>>) {
        self.send_script.lock().unwrap().extend(results);
    }

    pub fn script_refunds(&self, results: Vec<Result<(), TelegramError>>) {
        self.refund_script.lock().unwrap().extend(results);
    }

    pub fn send_attempts(&self) -> u32 {
        *self.send_attempts.lock().unwrap()
    }

    fn price_of(&self, gift_id: &str) -> i64 {
        self.gifts
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == gift_id)
            .map(|g| g.price)
            .unwrap_or(0)
    }
}

#[async_trait]
impl GiftApi for MockApi {
    async fn send_gift(&self, gift_id: &str, recipient: &Recipient) -> Result<(), TelegramError> {
        *self.send_attempts.lock().unwrap() += 1;
        if let Some(result) = self.send_script.lock().unwrap().pop_front() {
            result?;
        }
        let price = self.price_of(gift_id);
        let mut sent = self.sent.lock().unwrap();
        sent.push((gift_id.to_string(), recipient.clone()));
        let outgoing_id = format!("out-{}", sent.len());
        self.ledger.lock().unwrap().push(debit(&outgoing_id, price));
        Ok(())
    }

    async fn available_gifts(&self) -> Result<Vec<Gift>, TelegramError> {
        Ok(self.gifts.lock().unwrap().clone())
    }

    async fn star_transactions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StarTransaction>, TelegramError> {
        let ledger = self.ledger.lock().unwrap();
        let start = (offset.max(0) as usize).min(ledger.len());
        let end = (start + limit.max(0) as usize).min(ledger.len());
        Ok(ledger[start..end].to_vec())
    }

    async fn refund_star_payment(
        &self,
        _user_id: i64,
        txn_id: &str,
    ) -> Result<(), TelegramError> {
        if let Some(result) = self.refund_script.lock().unwrap().pop_front() {
            result?;
        }
        self.refunded.lock().unwrap().push(txn_id.to_string());
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(entry) = ledger.iter().find(|t| t.id == txn_id).cloned() {
            let refund_id = format!("refund-{txn_id}");
            ledger.push(debit(&refund_id, entry.amount));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub completed: Mutex<Vec<RunSummary>>,
    pub stalled: Mutex<Vec<RunSummary>>,
}

#[async_trait]
impl EngineNotifier for RecordingNotifier {
    async fn run_completed(&self, summary: &RunSummary) {
        self.completed.lock().unwrap().push(summary.clone());
    }

    async fn run_stalled(&self, summary: &RunSummary) {
        self.stalled.lock().unwrap().push(summary.clone());
    }
}

pub fn network_error() -> TelegramError {
    TelegramError::Network {
        message: "connection reset".to_string(),
    }
}

pub fn api_error(description: &str) -> TelegramError {
    TelegramError::Api {
        description: description.to_string(),
    }
}
