//! Realtime stream settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
/// Default event stream path.
pub const DEFAULT_EVENTS_PATH: &str = "/api/sse/events";
/// Fixed delay between a transport error and the next attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
/// Most recent generic messages kept in memory.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;
/// Time allowed for the TCP/TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Connection, buffering and routing settings for the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Backend origin, without trailing slash.
    pub base_url: String,
    /// Path of the event stream endpoint.
    pub events_path: String,
    /// Whether the session credential is sent with the stream request.
    pub with_credentials: bool,
    /// Session cookie (`name=value`) sent when credentials are included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    /// Delay before reconnecting after a transport error.
    pub reconnect_delay_ms: u64,
    /// Capacity of the recency buffer.
    pub buffer_capacity: usize,
    /// Connect timeout for the stream request.
    pub connect_timeout_ms: u64,
    /// Per-type routing policy.
    pub routing: RoutingSettings,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            events_path: DEFAULT_EVENTS_PATH.to_string(),
            with_credentials: true,
            session_cookie: None,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            routing: RoutingSettings::default(),
        }
    }
}

impl RealtimeSettings {
    /// Full URL of the event stream.
    pub fn events_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.events_path.starts_with('/') {
            format!("{base}{}", self.events_path)
        } else {
            format!("{base}/{}", self.events_path)
        }
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reject values that would make the client misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.bufferCapacity must be at least 1".to_string(),
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.reconnectDelayMs must be at least 1".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "realtime.baseUrl must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which frames are handled silently and which unknown types are buffered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingSettings {
    /// Types that are logged only: no fan-out, no buffering.
    pub silent_types: Vec<String>,
    /// Whether named types without a known kind also go to the recency buffer.
    pub buffer_unknown_types: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            silent_types: vec!["connected".to_string(), "ping".to_string()],
            buffer_unknown_types: true,
        }
    }
}

impl RoutingSettings {
    /// Whether frames of `event_type` are handled silently.
    pub fn is_silent(&self, event_type: &str) -> bool {
        self.silent_types.iter().any(|t| t == event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let settings = RealtimeSettings::default();
        assert_eq!(settings.events_url(), "http://localhost:5000/api/sse/events");
        assert!(settings.with_credentials);
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(settings.buffer_capacity, 100);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
        assert!(settings.routing.is_silent("ping"));
        assert!(settings.routing.is_silent("connected"));
        assert!(!settings.routing.is_silent("reload_created"));
    }

    #[test]
    fn events_url_joins_slashes() {
        let settings = RealtimeSettings {
            base_url: "https://felt.example.com/".into(),
            events_path: "stream".into(),
            ..RealtimeSettings::default()
        };
        assert_eq!(settings.events_url(), "https://felt.example.com/stream");
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let settings = RealtimeSettings {
            buffer_capacity: 0,
            ..RealtimeSettings::default()
        };
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("bufferCapacity"));
    }

    #[test]
    fn zero_delay_is_invalid() {
        let settings = RealtimeSettings {
            reconnect_delay_ms: 0,
            ..RealtimeSettings::default()
        };
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("reconnectDelayMs"));
    }

    #[test]
    fn session_cookie_omitted_when_unset() {
        let json = serde_json::to_value(RealtimeSettings::default()).unwrap();
        assert!(json.get("sessionCookie").is_none());
    }
}
