//! HTTP transport over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use felt_core::TransportError;
use felt_settings::RealtimeSettings;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE, HeaderValue};
use tracing::{debug, instrument};

use crate::parser::{SseDecoderOptions, frame_stream};
use crate::transport::{FrameStream, StreamRequest, Transport};

/// Error bodies longer than this are cut before they reach logs.
const MAX_ERROR_BODY: usize = 512;

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Opens the event stream with a plain `GET`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    session_cookie: Option<String>,
    decoder: SseDecoderOptions,
}

impl HttpTransport {
    /// Build a transport with its own client.
    pub fn new(
        connect_timeout: Duration,
        session_cookie: Option<String>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self::with_client(client, session_cookie))
    }

    /// Build a transport from realtime settings.
    pub fn from_settings(settings: &RealtimeSettings) -> Result<Self, TransportError> {
        Self::new(settings.connect_timeout(), settings.session_cookie.clone())
    }

    /// Use an existing client.
    pub fn with_client(client: reqwest::Client, session_cookie: Option<String>) -> Self {
        Self {
            client,
            session_cookie,
            decoder: SseDecoderOptions::default(),
        }
    }

    /// Override decoder options.
    #[must_use]
    pub fn with_decoder_options(mut self, decoder: SseDecoderOptions) -> Self {
        self.decoder = decoder;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %request.url))]
    async fn open(&self, request: &StreamRequest) -> Result<FrameStream, TransportError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        if let Some(id) = &request.last_event_id {
            builder = builder.header(LAST_EVENT_ID, id);
        }
        let cookie = self
            .session_cookie
            .as_ref()
            .filter(|_| request.with_credentials);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_body(&mut body);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let unexpected = response
            .headers()
            .get(CONTENT_TYPE)
            .filter(|value| !is_event_stream(value));
        if let Some(content_type) = unexpected {
            let value = content_type.to_str().unwrap_or("<binary>").to_string();
            return Err(TransportError::ContentType(value));
        }

        debug!(status = status.as_u16(), "event stream opened");
        Ok(Box::pin(frame_stream(
            response.bytes_stream(),
            self.decoder.clone(),
        )))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn is_event_stream(value: &HeaderValue) -> bool {
    value
        .to_str()
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("text/event-stream"))
        .unwrap_or(false)
}

fn truncate_body(body: &mut String) {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use felt_core::RawFrame;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(cookie: Option<&str>) -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5), cookie.map(str::to_string)).unwrap()
    }

    fn sse_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
    }

    #[tokio::test]
    async fn streams_frames_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sse/events"))
            .and(header("accept", "text/event-stream"))
            .and(header("cache-control", "no-cache"))
            .respond_with(sse_response(
                "event: connected\ndata: {\"message\":\"hi\"}\n\nevent: ping\ndata: {}\n\n",
            ))
            .mount(&server)
            .await;

        let request = StreamRequest::new(format!("{}/api/sse/events", server.uri()), true);
        let stream = transport(None).open(&request).await.unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(
            items,
            vec![
                Ok(RawFrame::named("connected", "{\"message\":\"hi\"}")),
                Ok(RawFrame::named("ping", "{}")),
                Err(TransportError::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn sends_cookie_and_last_event_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "session=abc"))
            .and(header("last-event-id", "41"))
            .respond_with(sse_response("data: 1\n\n"))
            .expect(1)
            .mount(&server)
            .await;

        let request = StreamRequest::new(server.uri(), true)
            .with_last_event_id(Some("41".to_string()));
        let result = transport(Some("session=abc")).open(&request).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn omits_cookie_without_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(sse_response("data: 1\n\n"))
            .mount(&server)
            .await;

        let request = StreamRequest::new(server.uri(), false);
        let _stream = transport(Some("session=abc")).open(&request).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("cookie"));
        assert!(!received[0].headers.contains_key("last-event-id"));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
            .mount(&server)
            .await;

        let request = StreamRequest::new(server.uri(), true);
        let result = transport(None).open(&request).await.map(|_| ());
        assert_matches!(result, Err(TransportError::Status { status: 401, ref body }) if body == "login required");
    }

    #[tokio::test]
    async fn wrong_content_type_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let request = StreamRequest::new(server.uri(), true);
        let result = transport(None).open(&request).await.map(|_| ());
        assert_matches!(result, Err(TransportError::ContentType(ref v)) if v == "text/html");
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        // Port 9 (discard) is not listening in the test environment
        let request = StreamRequest::new("http://127.0.0.1:9/events", true);
        let result = transport(None).open(&request).await.map(|_| ());
        assert_matches!(result, Err(TransportError::Request(_)));
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let mut body = "é".repeat(MAX_ERROR_BODY);
        truncate_body(&mut body);
        assert!(body.len() <= MAX_ERROR_BODY);
        assert!(body.chars().all(|c| c == 'é'));
    }

    #[test]
    fn event_stream_content_type_with_charset() {
        let value = HeaderValue::from_static("text/event-stream; charset=utf-8");
        assert!(is_event_stream(&value));
        assert!(!is_event_stream(&HeaderValue::from_static("application/json")));
    }
}
