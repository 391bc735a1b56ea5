//! # quire-settings
//!
//! Configuration for the quire page composer, loaded in three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`QuireSettings::default()`]
//! 2. **Settings file**: `~/.quire/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `QUIRE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = QuireSettings::default();
        assert_eq!(settings.template.delimiters.subtemplates.open, "<<");
        assert_eq!(settings.template.delimiters.modules.close, "]]");
        assert_eq!(settings.template.delimiters.fetch.open, "~~");
        assert_eq!(settings.template.delimiters.finalize.open, "{{");
        assert_eq!(settings.fetch.connect_timeout_ms, 1_000);
        assert_eq!(settings.fetch.max_rounds, 16);
        assert_eq!(settings.cache.backend, CacheBackend::None);
        assert_eq!(settings.cache.clear_key, "cc");
        assert_eq!(settings.logging.level, "warn");
    }
}
