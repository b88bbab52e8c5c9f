//! Domain model for the persisted bot configuration.
use serde::{Deserialize, Serialize};
use shared::{ConfigSummary, Recipient};

/// The single mutable configuration document driving the engine.
///
/// Exactly one exists per operator. All components read and write it
/// through the configuration store, never by holding a long-lived copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub min_price: i64,
    pub max_price: i64,
    pub min_supply: i64,
    pub max_supply: i64,
    /// Desired number of successful purchases for the current run.
    pub target_count: i64,
    pub target_user_id: Option<i64>,
    /// Channel username without the leading `@`. Mutually exclusive with
    /// `target_user_id`.
    pub target_channel: Option<String>,
    /// Cached star balance; recomputed from the ledger, never authoritative.
    pub balance: i64,
    /// Purchases completed in the current run.
    pub bought: i64,
    /// Whether the engine should attempt purchases.
    pub active: bool,
    /// Set once `bought >= target_count`; blocks re-triggering completion.
    pub done: bool,
    /// UI bookkeeping owned by the presentation layer.
    pub last_menu_message_id: Option<i64>,
}

impl BotConfig {
    /// Documented defaults, used both for a fresh document and to repair
    /// invalid fields on load. The gift recipient defaults to the operator.
    pub fn defaults_for(operator_id: i64) -> Self {
        Self {
            min_price: 5000,
            max_price: 10000,
            min_supply: 1000,
            max_supply: 10000,
            target_count: 5,
            target_user_id: Some(operator_id),
            target_channel: None,
            balance: 0,
            bought: 0,
            active: false,
            done: false,
            last_menu_message_id: None,
        }
    }

    /// The configured gift destination. The channel form wins when both
    /// fields are somehow set; `None` means the document lost both.
    pub fn recipient(&self) -> Option<Recipient> {
        if let Some(handle) = &self.target_channel {
            return Some(Recipient::Channel(handle.clone()));
        }
        self.target_user_id.map(Recipient::User)
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            active: self.active,
            min_price: self.min_price,
            max_price: self.max_price,
            min_supply: self.min_supply,
            max_supply: self.max_supply,
            bought: self.bought,
            target_count: self.target_count,
            recipient: self.recipient(),
            balance: self.balance,
        }
    }
}

/// A partial configuration for merge-saves: only the fields that are
/// `Some` are written, last-write-wins per field. Nullable document
/// fields use a nested `Option` so a patch can explicitly clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_supply: Option<i64>,
    pub max_supply: Option<i64>,
    pub target_count: Option<i64>,
    pub target_user_id: Option<Option<i64>>,
    pub target_channel: Option<Option<String>>,
    pub balance: Option<i64>,
    pub bought: Option<i64>,
    pub active: Option<bool>,
    pub done: Option<bool>,
    pub last_menu_message_id: Option<Option<i64>>,
}

impl ConfigPatch {
    pub fn apply(&self, config: &mut BotConfig) {
        if let Some(v) = self.min_price {
            config.min_price = v;
        }
        if let Some(v) = self.max_price {
            config.max_price = v;
        }
        if let Some(v) = self.min_supply {
            config.min_supply = v;
        }
        if let Some(v) = self.max_supply {
            config.max_supply = v;
        }
        if let Some(v) = self.target_count {
            config.target_count = v;
        }
        if let Some(v) = &self.target_user_id {
            config.target_user_id = *v;
        }
        if let Some(v) = &self.target_channel {
            config.target_channel = v.clone();
        }
        if let Some(v) = self.balance {
            config.balance = v;
        }
        if let Some(v) = self.bought {
            config.bought = v;
        }
        if let Some(v) = self.active {
            config.active = v;
        }
        if let Some(v) = self.done {
            config.done = v;
        }
        if let Some(v) = &self.last_menu_message_id {
            config.last_menu_message_id = *v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }
}
