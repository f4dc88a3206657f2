//! Settings loading.
//!
//! 1. Compiled [`KeeperSettings::default()`]
//! 2. `~/.keeper/settings.json`, deep-merged over the defaults when present
//! 3. `KEEPER_*` environment variables
//!
//! The result is validated before it is returned.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{KeeperSettings, Provider};

/// `~/.keeper/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".keeper").join("settings.json")
}

/// Load from the default path with environment overrides.
pub fn load_settings() -> Result<KeeperSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` with environment overrides. A missing file yields defaults.
pub fn load_settings_from_path(path: &Path) -> Result<KeeperSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

/// Load from `path`, resolving overrides through `lookup` instead of the
/// process environment.
pub fn load_with<F>(path: &Path, lookup: F) -> Result<KeeperSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(KeeperSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let content = std::fs::read_to_string(path)?;
        deep_merge(defaults, serde_json::from_str(&content)?)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: KeeperSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.database.validate()?;
    Ok(settings)
}

/// Merge `source` into `target`: objects recursively, everything else
/// replaced, nulls in `source` skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut into), Value::Object(from)) => {
            for (key, value) in from {
                if value.is_null() {
                    continue;
                }
                let merged = match into.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = into.insert(key, merged);
            }
            Value::Object(into)
        }
        (_, source) => source,
    }
}

/// Apply `KEEPER_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut KeeperSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

fn apply_overrides<F>(settings: &mut KeeperSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env(lookup);
    let db = &mut settings.database;

    if let Some(v) = env.parsed("KEEPER_DB_PROVIDER", |s| s.parse::<Provider>().ok()) {
        db.provider = v;
    }
    if let Some(v) = env.string("KEEPER_DB_CONNECTION") {
        db.connection_details = v;
    }
    if let Some(v) = env.parsed("KEEPER_DB_DEBUG", parse_bool) {
        db.debug = v;
    }
    if let Some(v) = env.parsed("KEEPER_DB_RUN_MIGRATIONS", parse_bool) {
        db.run_migrations = v;
    }
    if let Some(v) = env.parsed("KEEPER_DB_MAX_PING_ATTEMPTS", |s| parse_u32_range(s, 1, 10_000)) {
        db.max_ping_attempts = v;
    }
    if let Some(v) = env.parsed("KEEPER_DB_POOL_SIZE", |s| parse_u32_range(s, 1, 1024)) {
        db.pool_size = v;
    }
    if let Some(v) = env.string("KEEPER_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.string(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid env var, ignoring");
        }
        parsed
    }
}

// ── Pure parsers ────────────────────────────────────────────────────────────

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitive.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A `u32` within `min..=max`.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use keeper_core::logging::capture_logs;
    use tracing::Level;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn merge_nested_keeps_siblings() {
        let merged = deep_merge(
            serde_json::json!({"database": {"poolSize": 16, "debug": false}}),
            serde_json::json!({"database": {"poolSize": 4}}),
        );
        assert_eq!(merged["database"]["poolSize"], 4);
        assert_eq!(merged["database"]["debug"], false);
    }

    #[test]
    fn merge_skips_nulls_and_replaces_arrays() {
        let merged = deep_merge(
            serde_json::json!({"a": 1, "list": [1, 2, 3]}),
            serde_json::json!({"a": null, "list": [9]}),
        );
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["list"], serde_json::json!([9]));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_with(Path::new("/nonexistent/keeper.json"), no_env).unwrap();
        assert_eq!(settings, KeeperSettings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"provider": "postgres", "connectionDetails": "postgres://db/keeper", "streamBatchSize": 250}}"#,
        )
        .unwrap();

        let settings = load_with(&path, no_env).unwrap();
        assert_eq!(settings.database.provider, Provider::Postgres);
        assert_eq!(settings.database.stream_batch_size, 250);
        assert_eq!(settings.database.pool_size, 16);
    }

    #[test]
    fn test_user_section_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"createTestUser": {"username": "dev", "hashedPassword": "x", "isServiceAdmin": true}}}"#,
        )
        .unwrap();

        let settings = load_with(&path, no_env).unwrap();
        let user = settings.database.create_test_user.unwrap();
        assert_eq!(user.username, "dev");
        assert!(user.is_service_admin);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_with(&path, no_env), Err(SettingsError::Json(_))));
    }

    #[test]
    fn invalid_merged_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": {"poolSize": 0}}"#).unwrap();
        assert!(matches!(load_with(&path, no_env), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn env_overrides_win() {
        let settings = load_with(
            Path::new("/nonexistent"),
            env(&[
                ("KEEPER_DB_PROVIDER", "mariadb"),
                ("KEEPER_DB_CONNECTION", "mysql://db"),
                ("KEEPER_DB_DEBUG", "yes"),
                ("KEEPER_DB_RUN_MIGRATIONS", "off"),
                ("KEEPER_DB_MAX_PING_ATTEMPTS", "3"),
                ("KEEPER_DB_POOL_SIZE", "2"),
                ("KEEPER_LOG_LEVEL", "trace"),
            ]),
        )
        .unwrap();
        let db = &settings.database;
        assert_eq!(db.provider, Provider::MariaDb);
        assert_eq!(db.connection_details, "mysql://db");
        assert!(db.debug);
        assert!(!db.run_migrations);
        assert_eq!(db.max_ping_attempts, 3);
        assert_eq!(db.pool_size, 2);
        assert_eq!(settings.logging.level, "trace");
    }

    #[test]
    fn invalid_env_values_are_ignored_with_warning() {
        let (logs, _guard) = capture_logs();
        let settings = load_with(
            Path::new("/nonexistent"),
            env(&[("KEEPER_DB_POOL_SIZE", "0"), ("KEEPER_DB_DEBUG", "maybe")]),
        )
        .unwrap();
        assert_eq!(settings.database.pool_size, 16);
        assert!(!settings.database.debug);
        assert_eq!(logs.matching(Level::WARN, "invalid env var").len(), 2);
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
        assert_eq!(parse_u32_range("5", 1, 10), Some(5));
        assert_eq!(parse_u32_range("11", 1, 10), None);
        assert_eq!(parse_u32_range("-1", 1, 10), None);
    }
}
