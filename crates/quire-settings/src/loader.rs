//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`QuireSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `QUIRE_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{CacheBackend, QuireSettings, quire_home};

/// Resolve the path to the settings file (`~/.quire/settings.json`).
pub fn settings_path() -> PathBuf {
    quire_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<QuireSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<QuireSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<QuireSettings> {
    let defaults = serde_json::to_value(QuireSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut QuireSettings) {
    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("QUIRE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("QUIRE_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Fetch ───────────────────────────────────────────────────────
    if let Some(v) = read_env_u32("QUIRE_FETCH_MAX_ROUNDS", 1, 1_000) {
        settings.fetch.max_rounds = v;
    }
    if let Some(v) = read_env_u64("QUIRE_FETCH_CONNECT_TIMEOUT_MS", 1, 600_000) {
        settings.fetch.connect_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("QUIRE_FETCH_TIMEOUT_MS", 1, 3_600_000) {
        settings.fetch.timeout_ms = v;
    }

    // ── Cache ───────────────────────────────────────────────────────
    if let Some(v) = read_env_string("QUIRE_CACHE_BACKEND") {
        match parse_cache_backend(&v) {
            Some(backend) => settings.cache.backend = backend,
            None => {
                tracing::warn!(key = "QUIRE_CACHE_BACKEND", value = %v, "unknown cache backend, ignoring");
            }
        }
    }
    if let Some(v) = read_env_string("QUIRE_CACHE_PATH") {
        settings.cache.path = PathBuf::from(v);
    }
    if let Some(v) = read_env_u64("QUIRE_CACHE_TTL_SECS", 0, 31_536_000) {
        settings.cache.ttl_secs = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a cache backend name (case-insensitive).
pub fn parse_cache_backend(val: &str) -> Option<CacheBackend> {
    match val.to_lowercase().as_str() {
        "none" | "off" => Some(CacheBackend::None),
        "memory" => Some(CacheBackend::Memory),
        "sqlite" => Some(CacheBackend::Sqlite),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
