//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PuppetSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `PUPPET_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{PuppetSettings, StrategySetting};

/// Default settings file name, resolved against the working directory.
pub const SETTINGS_FILE: &str = "puppet.json";

/// Smallest RSA modulus the settings accept.
pub const MIN_KEY_BITS: usize = 1024;

/// Resolve the settings file path: `PUPPET_SETTINGS` if set, else `./puppet.json`.
pub fn settings_path() -> PathBuf {
    read_env_string("PUPPET_SETTINGS").map_or_else(|| PathBuf::from(SETTINGS_FILE), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PuppetSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid value is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PuppetSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Read and merge a settings file over the defaults, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<PuppetSettings> {
    let defaults = serde_json::to_value(PuppetSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut PuppetSettings) {
    apply_overrides_from(settings, read_env_string);
}

/// Apply overrides using an arbitrary variable lookup.
///
/// Invalid values are logged and ignored, keeping the file/default value.
pub fn apply_overrides_from<F>(settings: &mut PuppetSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PUPPET_SCENARIO") {
        settings.scenario = v;
    }
    if let Some(v) = lookup("PUPPET_STRATEGY") {
        match parse_strategy(&v) {
            Some(strategy) => settings.launcher.strategy = strategy,
            None => tracing::warn!(key = "PUPPET_STRATEGY", value = %v, "invalid strategy env var, ignoring"),
        }
    }
    if let Some(v) = lookup("PUPPET_TERMINAL") {
        if matches!(parse_bool(&v), Some(false)) || v.eq_ignore_ascii_case("none") {
            settings.launcher.terminal.enabled = false;
        } else {
            settings.launcher.terminal.enabled = true;
            settings.launcher.terminal.kill_pattern.clone_from(&v);
            settings.launcher.terminal.program = v;
        }
    }
    if let Some(v) = lookup("PUPPET_LOGS_DIR") {
        settings.launcher.logs_dir = Some(v);
    }
    if let Some(v) = lookup("PUPPET_KEYS_DIR") {
        settings.keys.dir = v;
    }
    if let Some(v) = lookup("PUPPET_BUILD") {
        match parse_bool(&v) {
            Some(enabled) => settings.build.enabled = enabled,
            None => tracing::warn!(key = "PUPPET_BUILD", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = lookup("PUPPET_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = lookup("PUPPET_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => tracing::warn!(key = "PUPPET_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Reject settings that cannot produce a session.
pub fn validate(settings: &PuppetSettings) -> Result<()> {
    if settings.scenario.trim().is_empty() {
        return Err(SettingsError::InvalidValue("scenario must not be empty".into()));
    }
    for (role, workload) in [
        ("nodes", &settings.nodes.workload),
        ("clients", &settings.clients.workload),
    ] {
        if workload.program.trim().is_empty() {
            return Err(SettingsError::InvalidValue(format!(
                "{role}.workload.program must not be empty"
            )));
        }
    }
    if settings.build.enabled && settings.build.program.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "build.program must not be empty when the build is enabled".into(),
        ));
    }
    let terminal = &settings.launcher.terminal;
    if terminal.enabled && terminal.program.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "launcher.terminal.program must not be empty when the terminal is enabled".into(),
        ));
    }
    if settings.keys.bits < MIN_KEY_BITS {
        return Err(SettingsError::InvalidValue(format!(
            "keys.bits must be at least {MIN_KEY_BITS}"
        )));
    }
    if settings.launcher.strategy == StrategySetting::Detached && !terminal.enabled {
        return Err(SettingsError::InvalidValue(
            "the detached strategy needs launcher.terminal to be enabled".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a launch strategy name.
pub fn parse_strategy(val: &str) -> Option<StrategySetting> {
    match val.to_lowercase().as_str() {
        "auto" => Some(StrategySetting::Auto),
        "spawn" => Some(StrategySetting::Spawn),
        "detached" => Some(StrategySetting::Detached),
        _ => None,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
