//! Errors raised while building a realtime client.
//!
//! Once running, the client never surfaces errors to callers: transport
//! failures turn into reconnects and bad frames are logged and dropped.

use felt_core::TransportError;
use felt_settings::SettingsError;
use thiserror::Error;

/// Construction-time failure.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Built outside a Tokio runtime.
    #[error("no Tokio runtime available; build the client inside a runtime")]
    NoRuntime,
    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// The default HTTP transport could not be created.
    #[error("failed to create transport: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for client construction.
pub type Result<T> = std::result::Result<T, RealtimeError>;

impl RealtimeError {
    /// Short classification string for logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NoRuntime => "no_runtime",
            Self::Settings(_) => "settings",
            Self::Transport(_) => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_kind() {
        let err = RealtimeError::NoRuntime;
        assert!(err.to_string().contains("Tokio runtime"));
        assert_eq!(err.error_kind(), "no_runtime");

        let err: RealtimeError = SettingsError::InvalidValue("bad".into()).into();
        assert_eq!(err.to_string(), "invalid settings value: bad");
        assert_eq!(err.error_kind(), "settings");

        let err: RealtimeError = TransportError::Request("tls".into()).into();
        assert_eq!(err.error_kind(), "transport");
    }
}
