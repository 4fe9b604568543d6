//! Frames as read from the wire and as handed to subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::errors::DecodeError;
use crate::events::EventKind;

/// One dispatched SSE event before JSON decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// `event` field, if the server sent one.
    pub event: Option<String>,
    /// Concatenated `data` lines.
    pub data: String,
    /// `id` field, if the server sent one.
    pub id: Option<String>,
}

impl RawFrame {
    /// Untyped frame with only data.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    /// Named frame.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }

    /// Attach an event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Routing key of this frame.
    pub fn kind(&self) -> EventKind {
        EventKind::from_event_field(self.event.as_deref())
    }

    /// Parse the data as JSON and stamp the frame.
    pub fn decode(self, received_at: DateTime<Utc>) -> Result<EventFrame, DecodeError> {
        let kind = self.kind();
        let payload = serde_json::from_str(&self.data).map_err(|source| {
            DecodeError::InvalidJson {
                event_type: kind.as_str().to_string(),
                source,
            }
        })?;
        Ok(EventFrame {
            kind,
            payload,
            received_at,
            last_event_id: self.id,
        })
    }
}

/// A decoded, immutable event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventFrame {
    /// Routing key.
    pub kind: EventKind,
    /// Parsed JSON payload.
    pub payload: Value,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
    /// SSE `id` carried by the frame.
    pub last_event_id: Option<String>,
}

impl EventFrame {
    /// Wire name of the frame's kind.
    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }
}

/// Serialized shape used when frames are logged.
#[derive(Serialize)]
struct FrameSummary<'a> {
    event_type: &'a str,
    received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

impl EventFrame {
    /// Compact JSON summary (type, receive time, ID) without the payload.
    pub fn summary(&self) -> String {
        let summary = FrameSummary {
            event_type: self.event_type(),
            received_at: self.received_at,
            id: self.last_event_id.as_deref(),
        };
        serde_json::to_string(&summary).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_named_json_frame() {
        let now = Utc::now();
        let frame = RawFrame::named("reload_created", r#"{"username":"ana","amount":50}"#)
            .with_id("17")
            .decode(now)
            .unwrap();
        assert_eq!(frame.kind, EventKind::ReloadCreated);
        assert_eq!(frame.payload["username"], json!("ana"));
        assert_eq!(frame.received_at, now);
        assert_eq!(frame.last_event_id.as_deref(), Some("17"));
    }

    #[test]
    fn untyped_frame_is_message() {
        let frame = RawFrame::message("42").decode(Utc::now()).unwrap();
        assert_eq!(frame.kind, EventKind::Message);
        assert_eq!(frame.payload, json!(42));
    }

    #[test]
    fn invalid_json_reports_event_type() {
        let err = RawFrame::named("ping", "not json").decode(Utc::now()).unwrap_err();
        assert_matches!(err, DecodeError::InvalidJson { ref event_type, .. } if event_type == "ping");
    }

    #[test]
    fn summary_omits_payload() {
        let frame = RawFrame::named("ping", r#"{"secret":1}"#)
            .decode(Utc::now())
            .unwrap();
        let summary = frame.summary();
        assert!(summary.contains("\"event_type\":\"ping\""));
        assert!(!summary.contains("secret"));
        assert!(!summary.contains("\"id\""));
    }
}
