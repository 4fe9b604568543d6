//! Transport abstraction for the event stream.

use std::pin::Pin;

use async_trait::async_trait;
use felt_core::{RawFrame, TransportError};
use futures::Stream;

/// Frames read from an open stream.
///
/// Ends with an `Err` when the connection breaks or the server closes it.
/// Dropping the stream closes the underlying connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, TransportError>> + Send>>;

/// Parameters of one stream request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    /// Full endpoint URL.
    pub url: String,
    /// Whether the session credential is attached.
    pub with_credentials: bool,
    /// `Last-Event-ID` to resume from.
    pub last_event_id: Option<String>,
}

impl StreamRequest {
    /// Request against `url` with no resume point.
    pub fn new(url: impl Into<String>, with_credentials: bool) -> Self {
        Self {
            url: url.into(),
            with_credentials,
            last_event_id: None,
        }
    }

    /// Resume after the given event ID.
    #[must_use]
    pub fn with_last_event_id(mut self, id: Option<String>) -> Self {
        self.last_event_id = id;
        self
    }
}

/// Opens server-push streams.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a stream. Resolves once the server has accepted the request.
    async fn open(&self, request: &StreamRequest) -> Result<FrameStream, TransportError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
