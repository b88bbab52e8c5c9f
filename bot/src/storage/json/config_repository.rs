//! # JSON Config Repository
//!
//! File-based configuration storage: one JSON document per operator.
//!
//! ## Load semantics
//!
//! `load` never fails. A missing or unparseable file is replaced by the
//! documented defaults; a document with missing or mistyped fields has
//! each offending field repaired to its default, and the corrected
//! document is persisted. Valid fields always survive a repair.
//!
//! ## Write semantics
//!
//! Writes go through a temp file plus rename, so a failed write leaves
//! the previous document intact. An internal mutex serializes writers
//! across the engine and dispatcher tasks.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::domain::models::{BotConfig, ConfigPatch};
use crate::storage::traits::ConfigStorage;

pub struct JsonConfigRepository {
    path: PathBuf,
    operator_id: i64,
    write_lock: Mutex<()>,
}

impl JsonConfigRepository {
    pub fn new(path: impl Into<PathBuf>, operator_id: i64) -> Self {
        Self {
            path: path.into(),
            operator_id,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn defaults(&self) -> BotConfig {
        BotConfig::defaults_for(self.operator_id)
    }

    /// Read and heal the document. Assumes the write lock is held when a
    /// repair may need persisting.
    fn load_inner(&self) -> BotConfig {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "creating configuration document");
                return self.write_fresh_defaults();
            }
            Err(e) => {
                // Transient I/O trouble: serve defaults without clobbering
                // whatever is on disk.
                error!("could not read configuration: {e}");
                return self.defaults();
            }
        };

        let raw = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    path = %self.path.display(),
                    "configuration document is not a JSON object, recreating with defaults"
                );
                return self.write_fresh_defaults();
            }
        };

        let (config, repaired) = self.heal(&raw);
        if repaired {
            if let Err(e) = self.write_document(&config) {
                error!("failed to persist repaired configuration: {e:#}");
            } else {
                info!("configuration document repaired and persisted");
            }
        }
        config
    }

    fn write_fresh_defaults(&self) -> BotConfig {
        let defaults = self.defaults();
        if let Err(e) = self.write_document(&defaults) {
            error!("failed to create configuration document: {e:#}");
        }
        defaults
    }

    /// Per-field validation against the documented schema. Returns the
    /// healed document and whether anything had to be repaired.
    fn heal(&self, raw: &Map<String, Value>) -> (BotConfig, bool) {
        let defaults = self.defaults();
        let mut repaired = false;
        let config = BotConfig {
            min_price: heal_i64(raw, "min_price", defaults.min_price, &mut repaired),
            max_price: heal_i64(raw, "max_price", defaults.max_price, &mut repaired),
            min_supply: heal_i64(raw, "min_supply", defaults.min_supply, &mut repaired),
            max_supply: heal_i64(raw, "max_supply", defaults.max_supply, &mut repaired),
            target_count: heal_i64(raw, "target_count", defaults.target_count, &mut repaired),
            target_user_id: heal_nullable_i64(
                raw,
                "target_user_id",
                defaults.target_user_id,
                &mut repaired,
            ),
            target_channel: heal_nullable_string(
                raw,
                "target_channel",
                defaults.target_channel.clone(),
                &mut repaired,
            ),
            balance: heal_i64(raw, "balance", defaults.balance, &mut repaired),
            bought: heal_i64(raw, "bought", defaults.bought, &mut repaired),
            active: heal_bool(raw, "active", defaults.active, &mut repaired),
            done: heal_bool(raw, "done", defaults.done, &mut repaired),
            last_menu_message_id: heal_nullable_i64(
                raw,
                "last_menu_message_id",
                defaults.last_menu_message_id,
                &mut repaired,
            ),
        };
        (config, repaired)
    }

    fn write_document(&self, config: &BotConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(config).context("serializing configuration")?;

        // Atomic write pattern: temp file, then rename.
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)
            .with_context(|| format!("writing {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

impl ConfigStorage for JsonConfigRepository {
    fn load(&self) -> BotConfig {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.load_inner()
    }

    fn merge(&self, patch: ConfigPatch) -> Result<BotConfig> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut config = self.load_inner();
        patch.apply(&mut config);
        if let Err(e) = self.write_document(&config) {
            error!("failed to save configuration: {e:#}");
            return Err(e);
        }
        Ok(config)
    }
}

fn heal_i64(raw: &Map<String, Value>, key: &str, default: i64, repaired: &mut bool) -> i64 {
    match raw.get(key).and_then(Value::as_i64) {
        Some(value) => value,
        None => {
            warn!("invalid or missing field `{key}`, using default {default}");
            *repaired = true;
            default
        }
    }
}

fn heal_bool(raw: &Map<String, Value>, key: &str, default: bool, repaired: &mut bool) -> bool {
    match raw.get(key).and_then(Value::as_bool) {
        Some(value) => value,
        None => {
            warn!("invalid or missing field `{key}`, using default {default}");
            *repaired = true;
            default
        }
    }
}

fn heal_nullable_i64(
    raw: &Map<String, Value>,
    key: &str,
    default: Option<i64>,
    repaired: &mut bool,
) -> Option<i64> {
    match raw.get(key) {
        Some(Value::Null) => None,
        Some(value) if value.as_i64().is_some() => value.as_i64(),
        _ => {
            warn!("invalid or missing field `{key}`, using default {default:?}");
            *repaired = true;
            default
        }
    }
}

fn heal_nullable_string(
    raw: &Map<String, Value>,
    key: &str,
    default: Option<String>,
    repaired: &mut bool,
) -> Option<String> {
    match raw.get(key) {
        Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        _ => {
            warn!("invalid or missing field `{key}`, using default {default:?}");
            *repaired = true;
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OPERATOR: i64 = 42;

    fn setup() -> (JsonConfigRepository, TempDir) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let repo = JsonConfigRepository::new(temp_dir.path().join("config.json"), OPERATOR);
        (repo, temp_dir)
    }

    #[test]
    fn load_creates_defaults_when_missing() {
        let (repo, _temp_dir) = setup();

        let config = repo.load();
        assert_eq!(config, BotConfig::defaults_for(OPERATOR));
        assert_eq!(config.target_user_id, Some(OPERATOR));
        // the default document was persisted
        assert!(repo.path().exists());
    }

    #[test]
    fn load_repairs_missing_and_mistyped_fields() {
        let (repo, _temp_dir) = setup();
        // `target_count` missing, `min_price` mistyped, `active` valid
        fs::write(
            repo.path(),
            r#"{"min_price": "oops", "max_price": 9000, "active": true}"#,
        )
        .unwrap();

        let config = repo.load();
        assert_eq!(config.target_count, 5);
        assert_eq!(config.min_price, 5000);
        // valid fields survive the repair
        assert_eq!(config.max_price, 9000);
        assert!(config.active);

        // the corrected document was persisted and loads cleanly
        let raw: Value = serde_json::from_str(&fs::read_to_string(repo.path()).unwrap()).unwrap();
        assert_eq!(raw["target_count"], 5);
        assert_eq!(raw["min_price"], 5000);
        assert_eq!(raw["max_price"], 9000);
    }

    #[test]
    fn load_tolerates_nulls_only_where_allowed() {
        let (repo, _temp_dir) = setup();
        fs::write(
            repo.path(),
            r#"{"target_user_id": null, "target_channel": null, "balance": null}"#,
        )
        .unwrap();

        let config = repo.load();
        assert_eq!(config.target_user_id, None);
        assert_eq!(config.target_channel, None);
        // `balance` is not nullable and falls back to its default
        assert_eq!(config.balance, 0);
    }

    #[test]
    fn load_recreates_corrupt_document() {
        let (repo, _temp_dir) = setup();
        fs::write(repo.path(), "not json at all").unwrap();

        let config = repo.load();
        assert_eq!(config, BotConfig::defaults_for(OPERATOR));
        let reloaded = repo.load();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn merge_touches_only_patched_fields() {
        let (repo, _temp_dir) = setup();
        repo.load();

        // a deposit callback updates the balance...
        repo.merge(ConfigPatch {
            balance: Some(750),
            ..ConfigPatch::default()
        })
        .unwrap();

        // ...and a later toggle must not clobber it
        let config = repo
            .merge(ConfigPatch {
                active: Some(true),
                ..ConfigPatch::default()
            })
            .unwrap();

        assert!(config.active);
        assert_eq!(config.balance, 750);

        let reloaded = repo.load();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn merge_can_clear_nullable_fields() {
        let (repo, _temp_dir) = setup();
        repo.load();

        let config = repo
            .merge(ConfigPatch {
                target_user_id: Some(None),
                target_channel: Some(Some("deals".to_string())),
                ..ConfigPatch::default()
            })
            .unwrap();

        assert_eq!(config.target_user_id, None);
        assert_eq!(config.target_channel.as_deref(), Some("deals"));

        let reloaded = repo.load();
        assert_eq!(reloaded.target_user_id, None);
        assert_eq!(reloaded.target_channel.as_deref(), Some("deals"));
    }

    #[test]
    fn config_persists_across_repository_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let repo = JsonConfigRepository::new(&path, OPERATOR);
        repo.merge(ConfigPatch {
            bought: Some(3),
            active: Some(true),
            ..ConfigPatch::default()
        })
        .unwrap();

        // simulating a process restart
        let repo2 = JsonConfigRepository::new(&path, OPERATOR);
        let config = repo2.load();
        assert_eq!(config.bought, 3);
        assert!(config.active);
    }
}
