//! # Storage Traits
//!
//! Storage abstraction for the configuration document, so the domain
//! layer can work against any backing store (JSON file, test double).

use anyhow::Result;

use crate::domain::models::{BotConfig, ConfigPatch};

/// Owner of the persisted configuration document.
///
/// All cross-task state flows through this trait: the engine and the
/// dispatcher never share the document in memory, they re-read and
/// merge-write it here.
pub trait ConfigStorage: Send + Sync {
    /// Return a fully valid document.
    ///
    /// Self-healing is part of the contract: a missing document, a
    /// missing field or a field of the wrong type is replaced by its
    /// documented default, the corrected document is persisted and the
    /// repair logged as a warning. Never fails.
    fn load(&self) -> BotConfig;

    /// Merge the provided fields into the persisted document
    /// (read-modify-write, last-write-wins per field) and return the
    /// resulting document. A failed write leaves the previous on-disk
    /// state intact.
    fn merge(&self, patch: ConfigPatch) -> Result<BotConfig>;
}
