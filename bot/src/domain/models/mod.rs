pub mod config;

pub use config::{BotConfig, ConfigPatch};
