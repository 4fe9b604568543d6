//! Error types for the realtime client.
//!
//! - [`TransportError`]: the stream could not be opened or broke while reading.
//!   Always recoverable; the connection manager answers it with a retry.
//! - [`DecodeError`]: a single frame could not be turned into an event. The
//!   frame is dropped, the connection stays up.

use thiserror::Error;

/// Failure to open or read the server-push stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent (DNS, refused connection, TLS).
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The server answered with something other than an event stream.
    #[error("unexpected content type: {0}")]
    ContentType(String),
    /// Reading the body failed after the stream was open.
    #[error("stream read failed: {0}")]
    Read(String),
    /// The server ended the stream.
    #[error("stream closed by server")]
    Closed,
}

impl TransportError {
    /// Short classification string for logs and metric labels.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Status { .. } => "status",
            Self::ContentType(_) => "content_type",
            Self::Read(_) => "read",
            Self::Closed => "closed",
        }
    }

    /// Whether the server rejected the session (401/403).
    ///
    /// Still retried, but worth logging louder: the stream will not come back
    /// until the user signs in again.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Failure to decode one frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The `data` field was not valid JSON.
    #[error("invalid JSON in `{event_type}` frame: {source}")]
    InvalidJson {
        /// Event type name of the offending frame.
        event_type: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The JSON did not have the shape expected for the event type.
    #[error("unexpected `{event_type}` payload shape: {source}")]
    PayloadShape {
        /// Event type name of the offending frame.
        event_type: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Event type name of the frame that failed to decode.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::InvalidJson { event_type, .. } | Self::PayloadShape { event_type, .. } => {
                event_type
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = TransportError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 502: bad gateway");
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(TransportError::Closed.error_kind(), "closed");
        assert_eq!(TransportError::Read("eof".into()).error_kind(), "read");
        assert_eq!(
            TransportError::ContentType("text/html".into()).error_kind(),
            "content_type"
        );
    }

    #[test]
    fn auth_failure_classification() {
        let unauthorized = TransportError::Status {
            status: 401,
            body: String::new(),
        };
        let forbidden = TransportError::Status {
            status: 403,
            body: String::new(),
        };
        let server = TransportError::Status {
            status: 500,
            body: String::new(),
        };
        assert!(unauthorized.is_auth_failure());
        assert!(forbidden.is_auth_failure());
        assert!(!server.is_auth_failure());
        assert!(!TransportError::Closed.is_auth_failure());
    }

    #[test]
    fn decode_error_keeps_event_type() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = DecodeError::InvalidJson {
            event_type: "reload_created".into(),
            source,
        };
        assert_eq!(err.event_type(), "reload_created");
        assert!(err.to_string().starts_with("invalid JSON in `reload_created` frame"));
    }
}
