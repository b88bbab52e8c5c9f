//! Collaborator boundary: the slice of the Telegram Bot API this bot needs.
//!
//! The domain layer only ever sees the [`GiftApi`] trait; the HTTP
//! implementation lives in [`http`] and the raw wire shapes in [`types`].

mod client;
pub mod http;
pub mod types;

pub use client::{GiftApi, TelegramError};
