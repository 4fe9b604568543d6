//! Logging settings.

use felt_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`). `RUST_LOG` wins.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LoggingSettings {
    /// Install the global stderr subscriber with this level and format.
    ///
    /// `RUST_LOG` still takes precedence. A no-op if a global subscriber is
    /// already installed.
    pub fn init(&self) {
        felt_core::logging::init_subscriber_with_format(&self.level, self.format);
    }
}
