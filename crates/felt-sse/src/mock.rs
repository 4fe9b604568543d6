//! Scripted in-memory transport for tests.
//!
//! Every successful [`Transport::open`] creates a [`MockConnection`], the
//! server side of the stream. Tests push frames or failures through it and
//! observe whether the client has closed it.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use felt_core::{RawFrame, TransportError};
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::transport::{FrameStream, StreamRequest, Transport};

type Item = Result<RawFrame, TransportError>;

/// Server side of one mock stream.
#[derive(Clone, Debug)]
pub struct MockConnection {
    request: StreamRequest,
    tx: mpsc::UnboundedSender<Item>,
    closed: Arc<AtomicBool>,
}

impl MockConnection {
    /// Request that opened this stream.
    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Push a named frame. Returns `false` if the client already closed it.
    pub fn send(&self, event: &str, data: &str) -> bool {
        self.frame(RawFrame::named(event, data))
    }

    /// Push a named frame with a JSON payload.
    pub fn send_json(&self, event: &str, payload: &serde_json::Value) -> bool {
        self.send(event, &payload.to_string())
    }

    /// Push an untyped frame.
    pub fn message(&self, data: &str) -> bool {
        self.frame(RawFrame::message(data))
    }

    /// Push an arbitrary frame.
    pub fn frame(&self, frame: RawFrame) -> bool {
        self.tx.send(Ok(frame)).is_ok()
    }

    /// Break the stream with a read error.
    pub fn fail(&self, message: &str) -> bool {
        self.tx.send(Err(TransportError::Read(message.to_string()))).is_ok()
    }

    /// End the stream as if the server closed it.
    pub fn end(&self) -> bool {
        self.tx.send(Err(TransportError::Closed)).is_ok()
    }

    /// Whether the client dropped its end.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Item>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

impl Stream for MockStream {
    type Item = Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Inner {
    attempts: AtomicUsize,
    closes: Arc<AtomicUsize>,
    failures: Mutex<VecDeque<TransportError>>,
    connections: Mutex<Vec<MockConnection>>,
    requests: Mutex<Vec<StreamRequest>>,
    changed: Notify,
}

/// Transport whose streams are driven by the test.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    /// Create a transport with no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail with `error`. Calls queue up.
    pub fn fail_next_open(&self, error: TransportError) {
        self.inner.failures.lock().push_back(error);
    }

    /// Number of `open` calls, successful or not.
    pub fn attempt_count(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Number of streams successfully opened.
    pub fn open_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Number of streams the client has dropped.
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Number of opened streams the client still holds.
    pub fn live_count(&self) -> usize {
        self.inner
            .connections
            .lock()
            .iter()
            .filter(|c| !c.is_closed())
            .count()
    }

    /// Every request seen, in order, including failed ones.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.inner.requests.lock().clone()
    }

    /// Server side of the `index`th opened stream.
    pub fn connection(&self, index: usize) -> Option<MockConnection> {
        self.inner.connections.lock().get(index).cloned()
    }

    /// Server side of the most recently opened stream.
    pub fn latest(&self) -> Option<MockConnection> {
        self.inner.connections.lock().last().cloned()
    }

    /// Wait until at least `count` `open` calls have been made.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let changed = self.inner.changed.notified();
            if self.attempt_count() >= count {
                return;
            }
            changed.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, request: &StreamRequest) -> Result<FrameStream, TransportError> {
        self.inner.requests.lock().push(request.clone());
        let scripted = self.inner.failures.lock().pop_front();

        let result = match scripted {
            Some(error) => Err(error),
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                let closed = Arc::new(AtomicBool::new(false));
                self.inner.connections.lock().push(MockConnection {
                    request: request.clone(),
                    tx,
                    closed: Arc::clone(&closed),
                });
                let stream: FrameStream = Box::pin(MockStream {
                    rx,
                    closed,
                    closes: Arc::clone(&self.inner.closes),
                });
                Ok(stream)
            }
        };

        let _ = self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
        result
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn frames_flow_to_client() {
        let transport = MockTransport::new();
        let mut stream = transport
            .open(&StreamRequest::new("mock://events", true))
            .await
            .unwrap();

        let conn = transport.latest().unwrap();
        assert!(conn.send("ping", "{}"));
        assert!(conn.message("1"));
        assert!(conn.end());

        assert_eq!(stream.next().await, Some(Ok(RawFrame::named("ping", "{}"))));
        assert_eq!(stream.next().await, Some(Ok(RawFrame::message("1"))));
        assert_eq!(stream.next().await, Some(Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn scripted_failure_consumed_once() {
        let transport = MockTransport::new();
        transport.fail_next_open(TransportError::Request("refused".into()));
        let request = StreamRequest::new("mock://events", true);

        assert_matches!(transport.open(&request).await.map(|_| ()), Err(TransportError::Request(_)));
        assert!(transport.open(&request).await.is_ok());
        assert_eq!(transport.attempt_count(), 2);
        assert_eq!(transport.open_count(), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn dropping_stream_marks_connection_closed() {
        let transport = MockTransport::new();
        let stream = transport
            .open(&StreamRequest::new("mock://events", true))
            .await
            .unwrap();
        let conn = transport.latest().unwrap();
        assert!(!conn.is_closed());
        assert_eq!(transport.live_count(), 1);

        drop(stream);
        assert!(conn.is_closed());
        assert!(!conn.send("ping", "{}"));
        assert_eq!(transport.close_count(), 1);
        assert_eq!(transport.live_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_attempts_returns_once_reached() {
        let transport = MockTransport::new();
        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.wait_for_attempts(1).await })
        };
        tokio::task::yield_now().await;
        let _stream = transport
            .open(&StreamRequest::new("mock://events", true))
            .await
            .unwrap();
        waiter.await.unwrap();
        assert_eq!(transport.attempt_count(), 1);
    }
}
