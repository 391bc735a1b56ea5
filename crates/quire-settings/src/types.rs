//! Settings type definitions.
//!
//! All types use camelCase JSON field names and `#[serde(default)]`, so a
//! partial settings file only needs the values it changes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuireSettings {
    /// Template placeholder syntax.
    pub template: TemplateSettings,
    /// Fetch scheduler defaults and the fetch round cap.
    pub fetch: FetchSettings,
    /// Cache backend selection.
    pub cache: CacheSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl QuireSettings {
    /// Reject values the composer cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.template.delimiters.validate()?;
        if self.fetch.max_rounds == 0 {
            return Err(SettingsError::InvalidValue(
                "fetch.maxRounds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Template settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateSettings {
    /// Delimiter pair per phase.
    pub delimiters: DelimiterSettings,
}

/// An open/close delimiter pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiter {
    /// Opening token.
    pub open: String,
    /// Closing token.
    pub close: String,
}

impl Delimiter {
    /// Build a pair.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

/// Delimiters of the four placeholder classes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelimiterSettings {
    /// Sub-template inclusion.
    pub subtemplates: Delimiter,
    /// Module invocation.
    pub modules: Delimiter,
    /// Deferred module sentinel.
    pub fetch: Delimiter,
    /// Final page key substitution.
    pub finalize: Delimiter,
}

impl Default for DelimiterSettings {
    fn default() -> Self {
        Self {
            subtemplates: Delimiter::new("<<", ">>"),
            modules: Delimiter::new("[[", "]]"),
            fetch: Delimiter::new("~~", "~~"),
            finalize: Delimiter::new("{{", "}}"),
        }
    }
}

impl DelimiterSettings {
    fn validate(&self) -> Result<()> {
        let pairs = [
            ("subtemplates", &self.subtemplates),
            ("modules", &self.modules),
            ("fetch", &self.fetch),
            ("finalize", &self.finalize),
        ];
        for (name, pair) in pairs {
            if pair.open.is_empty() || pair.close.is_empty() {
                return Err(SettingsError::InvalidValue(format!(
                    "template.delimiters.{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Fetch scheduler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchSettings {
    /// Default connect timeout per operation.
    pub connect_timeout_ms: u64,
    /// Default total timeout per operation.
    pub timeout_ms: u64,
    /// `User-Agent` header sent with every operation.
    pub user_agent: String,
    /// Maximum fetch rounds per render before deferred modules are abandoned.
    pub max_rounds: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1_000,
            timeout_ms: 10_000,
            user_agent: "quire/0.1".to_string(),
            max_rounds: 16,
        }
    }
}

impl FetchSettings {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Total timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which cache backend to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// No caching.
    #[default]
    None,
    /// Process-local memory.
    Memory,
    /// `SQLite` database file.
    Sqlite,
}

/// Cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Backend selection.
    pub backend: CacheBackend,
    /// Database path for the `SQLite` backend.
    pub path: PathBuf,
    /// Entry lifetime in seconds; 0 keeps entries until purged.
    pub ttl_secs: u64,
    /// Name of the request flag that forces a cache clear.
    pub clear_key: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            path: quire_home().join("cache").join("modules.db"),
            ttl_secs: 0,
            clear_key: "cc".to_string(),
        }
    }
}

impl CacheSettings {
    /// TTL as a [`Duration`], `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// `~/.quire`, falling back to `/tmp/.quire` when `HOME` is unset.
pub fn quire_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".quire")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: QuireSettings = serde_json::from_str(
            r#"{"fetch": {"maxRounds": 4}, "template": {"delimiters": {"modules": {"open": "[%", "close": "%]"}}}}"#,
        )
        .unwrap();
        assert_eq!(settings.fetch.max_rounds, 4);
        assert_eq!(settings.fetch.connect_timeout_ms, 1_000);
        assert_eq!(settings.template.delimiters.modules.open, "[%");
        assert_eq!(settings.template.delimiters.subtemplates.open, "<<");
    }

    #[test]
    fn camel_case_field_names() {
        let json = serde_json::to_value(QuireSettings::default()).unwrap();
        assert!(json["fetch"]["connectTimeoutMs"].is_u64());
        assert!(json["cache"]["clearKey"].is_string());
        assert_eq!(json["cache"]["backend"], "none");
    }

    #[test]
    fn ttl_zero_means_no_expiry() {
        let mut cache = CacheSettings::default();
        assert_eq!(cache.ttl(), None);
        cache.ttl_secs = 30;
        assert_eq!(cache.ttl(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn validate_rejects_empty_delimiter() {
        let mut settings = QuireSettings::default();
        settings.template.delimiters.fetch.close = String::new();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("template.delimiters.fetch"));
    }

    #[test]
    fn validate_rejects_zero_rounds() {
        let mut settings = QuireSettings::default();
        settings.fetch.max_rounds = 0;
        assert!(settings.validate().is_err());
        settings.fetch.max_rounds = 1;
        assert!(settings.validate().is_ok());
    }
}
