//! # felt-settings
//!
//! Layered configuration for the Felt realtime client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FeltSettings::default()`]
//! 2. **User file**: `~/.felt/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FELT_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with_env, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<FeltSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.felt/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static FeltSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|error| {
            tracing::warn!(%error, "failed to load settings, using defaults");
            FeltSettings::default()
        })
    })
}

/// Install the global log subscriber configured by [`get_settings`].
pub fn init_logging() {
    get_settings().logging.init();
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: FeltSettings) -> std::result::Result<(), FeltSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_dashboard_behavior() {
        let settings = FeltSettings::default();
        assert_eq!(settings.realtime.base_url, "http://localhost:5000");
        assert_eq!(settings.realtime.events_path, "/api/sse/events");
        assert!(settings.realtime.with_credentials);
        assert_eq!(settings.realtime.reconnect_delay_ms, 5000);
        assert_eq!(settings.realtime.buffer_capacity, 100);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn global_settings_initialize_once() {
        let first = get_settings().clone();
        assert!(init_settings(FeltSettings::default()).is_err());
        assert_eq!(get_settings(), &first);
    }
}
