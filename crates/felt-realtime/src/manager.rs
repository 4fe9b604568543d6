//! # Connection manager
//!
//! Owns the single stream connection of a client and everything that happens
//! to frames read from it.
//!
//! Each connection attempt gets a new [`ConnectionHandle`] with a fresh
//! generation ([`ConnectionId`]) and cancellation token. The handle is stored
//! before its driver task starts, so routing is in place before the first
//! frame can arrive. Driver callbacks and reconnect timers carry the
//! generation they were created for and are ignored once it is no longer
//! current.
//!
//! Transport errors are never fatal: the handle moves to `closed`,
//! connectivity drops to `false`, and a single reconnect fires after the
//! fixed delay if nothing else has replaced the handle in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use felt_core::{ConnectionId, EventFrame, EventKind, Notice, RawFrame, RealtimeEvent, TransportError};
use felt_settings::RealtimeSettings;
use felt_sse::{StreamRequest, Transport};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::buffer::{BufferEntry, RecencyBuffer};
use crate::errors::{RealtimeError, Result};
use crate::notices::NoticeSink;
use crate::registry::DispatchRegistry;
use crate::router::{FrameRoute, FrameRouter};
use crate::state::{ConnectionState, LifecycleEvent};

/// Result of a connect request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection was started.
    Started(ConnectionId),
    /// A connection is already connecting or open; nothing changed.
    AlreadyActive(ConnectionId),
}

impl ConnectOutcome {
    /// Generation of the connection that is now current.
    pub fn connection_id(self) -> ConnectionId {
        match self {
            Self::Started(id) | Self::AlreadyActive(id) => id,
        }
    }

    /// Whether a new connection was started.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// The current connection.
struct ConnectionHandle {
    id: ConnectionId,
    state: ConnectionState,
    request: StreamRequest,
    cancel: CancellationToken,
}

/// What a driver task needs to start.
struct Launch {
    id: ConnectionId,
    request: StreamRequest,
    cancel: CancellationToken,
}

struct Shared {
    events_url: String,
    with_credentials: bool,
    reconnect_delay_ms: u64,
    transport: Arc<dyn Transport>,
    registry: DispatchRegistry,
    router: FrameRouter,
    buffer: Mutex<RecencyBuffer>,
    notices: Arc<dyn NoticeSink>,
    slot: Mutex<Option<ConnectionHandle>>,
    next_generation: AtomicU64,
    last_event_id: Mutex<Option<String>>,
    connectivity: watch::Sender<bool>,
    runtime: Handle,
}

/// Manages the lifecycle of one event stream connection.
///
/// Cloning shares the same connection. When the last clone is dropped the
/// connection is cancelled and pending reconnect timers become no-ops.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager. Must be called inside a Tokio runtime; nothing is
    /// connected until [`connect`](Self::connect) is called.
    pub fn new(
        settings: &RealtimeSettings,
        transport: Arc<dyn Transport>,
        registry: DispatchRegistry,
        notices: Arc<dyn NoticeSink>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| RealtimeError::NoRuntime)?;
        let (connectivity, _) = watch::channel(false);

        debug!(
            url = settings.events_url().as_str(),
            transport = transport.name(),
            reconnect_delay_ms = settings.reconnect_delay_ms,
            buffer_capacity = settings.buffer_capacity,
            "connection manager created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                events_url: settings.events_url(),
                with_credentials: settings.with_credentials,
                reconnect_delay_ms: settings.reconnect_delay_ms,
                transport,
                registry,
                router: FrameRouter::from_settings(&settings.routing),
                buffer: Mutex::new(RecencyBuffer::new(settings.buffer_capacity)),
                notices,
                slot: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                last_event_id: Mutex::new(None),
                connectivity,
                runtime,
            }),
        })
    }

    /// Open the stream unless a connection is already connecting or open.
    ///
    /// A retained `closed` handle is replaced.
    pub fn connect(&self) -> ConnectOutcome {
        self.shared.connect()
    }

    /// Cancel the current connection, if any, and drop connectivity to `false`.
    ///
    /// Returns whether a connection was cancelled. Calling it again is a no-op.
    pub fn disconnect(&self) -> bool {
        let handle = self.shared.slot.lock().take();
        let _ = self.shared.connectivity.send_replace(false);
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                info!(generation = %handle.id, state = %handle.state, "realtime stream disconnected");
                true
            }
            None => false,
        }
    }

    /// Lifecycle state of the current connection.
    pub fn state(&self) -> ConnectionState {
        self.shared
            .slot
            .lock()
            .as_ref()
            .map_or(ConnectionState::Idle, |h| h.state)
    }

    /// Generation of the current connection.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.shared.slot.lock().as_ref().map(|h| h.id)
    }

    /// Whether a connection is connecting or open.
    pub fn has_live_connection(&self) -> bool {
        self.shared
            .slot
            .lock()
            .as_ref()
            .is_some_and(|h| h.state.is_live())
    }

    /// Current connectivity.
    pub fn is_connected(&self) -> bool {
        *self.shared.connectivity.borrow()
    }

    /// Receiver that observes every connectivity change.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.shared.connectivity.subscribe()
    }

    /// Registry frames are dispatched through.
    pub fn registry(&self) -> &DispatchRegistry {
        &self.shared.registry
    }

    /// Copy of the recency buffer, oldest first.
    pub fn recent_events(&self) -> Vec<BufferEntry> {
        self.shared.buffer.lock().snapshot()
    }

    /// Last SSE `id` received, sent as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.last_event_id.lock().clone()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.events_url)
            .field("state", &self.state())
            .field("connection", &self.current_connection())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn connect(self: &Arc<Self>) -> ConnectOutcome {
        let launch = {
            let mut slot = self.slot.lock();
            let active = slot
                .as_ref()
                .filter(|h| h.state.transition(LifecycleEvent::Connect).is_none());
            if let Some(handle) = active {
                debug!(generation = %handle.id, state = %handle.state, "connect ignored, connection active");
                return ConnectOutcome::AlreadyActive(handle.id);
            }
            self.install(&mut slot)
        };
        ConnectOutcome::Started(self.launch(launch))
    }

    /// Reconnect if `expected` is still the current, closed connection.
    fn retry(self: &Arc<Self>, expected: ConnectionId) -> Option<ConnectionId> {
        let launch = {
            let mut slot = self.slot.lock();
            let due = slot.as_ref().is_some_and(|h| {
                h.id == expected && h.state.transition(LifecycleEvent::RetryDue).is_some()
            });
            if !due {
                return None;
            }
            self.install(&mut slot)
        };
        Some(self.launch(launch))
    }

    fn install(&self, slot: &mut Option<ConnectionHandle>) -> Launch {
        let id = ConnectionId::from_raw(self.next_generation.fetch_add(1, Ordering::Relaxed) + 1);
        let request = StreamRequest::new(self.events_url.clone(), self.with_credentials)
            .with_last_event_id(self.last_event_id.lock().clone());
        let cancel = CancellationToken::new();

        let handle = ConnectionHandle {
            id,
            state: ConnectionState::Connecting,
            request: request.clone(),
            cancel: cancel.clone(),
        };
        if let Some(previous) = slot.replace(handle) {
            previous.cancel.cancel();
        }
        Launch {
            id,
            request,
            cancel,
        }
    }

    fn launch(self: &Arc<Self>, launch: Launch) -> ConnectionId {
        let Launch {
            id,
            request,
            cancel,
        } = launch;
        metrics::counter!("realtime_connect_attempts_total").increment(1);
        debug!(
            generation = %id,
            url = request.url.as_str(),
            last_event_id = request.last_event_id.as_deref(),
            "connecting"
        );
        let _ = self
            .runtime
            .spawn(drive(Arc::downgrade(self), id, request, cancel));
        id
    }

    fn on_open(&self, id: ConnectionId) -> bool {
        {
            let mut slot = self.slot.lock();
            let Some(handle) = slot.as_mut().filter(|h| h.id == id) else {
                debug!(generation = %id, "stale connection opened, ignoring");
                return false;
            };
            let Some(next) = handle.state.transition(LifecycleEvent::Opened) else {
                return false;
            };
            handle.state = next;
        }

        let _ = self.connectivity.send_replace(true);
        info!(generation = %id, "realtime stream open");
        self.notices.notify(&Notice::connected());
        true
    }

    fn on_failure(self: &Arc<Self>, id: ConnectionId, error: &TransportError) {
        {
            let mut slot = self.slot.lock();
            let Some(handle) = slot.as_mut().filter(|h| h.id == id) else {
                debug!(generation = %id, %error, "failure of stale connection, ignoring");
                return;
            };
            let Some(next) = handle.state.transition(LifecycleEvent::Failed) else {
                return;
            };
            handle.state = next;
        }

        let _ = self.connectivity.send_replace(false);
        metrics::counter!("realtime_transport_errors_total", "kind" => error.error_kind()).increment(1);
        if error.is_auth_failure() {
            warn!(
                generation = %id,
                %error,
                delay_ms = self.reconnect_delay_ms,
                "event stream rejected the session, will retry"
            );
        } else {
            warn!(
                generation = %id,
                %error,
                error_kind = error.error_kind(),
                delay_ms = self.reconnect_delay_ms,
                "event stream failed, scheduling reconnect"
            );
        }
        self.schedule_reconnect(id);
    }

    fn schedule_reconnect(self: &Arc<Self>, id: ConnectionId) {
        let shared = Arc::downgrade(self);
        let delay = Duration::from_millis(self.reconnect_delay_ms);
        let _ = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            match shared.retry(id) {
                Some(next) => {
                    metrics::counter!("realtime_reconnects_total").increment(1);
                    info!(previous = %id, generation = %next, "reconnecting event stream");
                }
                None => debug!(generation = %id, "stale reconnect timer ignored"),
            }
        });
    }

    fn is_current_open(&self, id: ConnectionId) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|h| h.id == id && h.state == ConnectionState::Open)
    }

    fn on_frame(&self, id: ConnectionId, raw: RawFrame) {
        if !self.is_current_open(id) {
            debug!(generation = %id, "frame from stale connection dropped");
            return;
        }
        if let Some(event_id) = &raw.id {
            *self.last_event_id.lock() = Some(event_id.clone());
        }

        let frame = match raw.decode(Utc::now()) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(
                    generation = %id,
                    event_type = error.event_type(),
                    %error,
                    "dropping undecodable frame"
                );
                metrics::counter!("realtime_decode_failures_total").increment(1);
                return;
            }
        };
        metrics::counter!("realtime_frames_total", "kind" => kind_label(&frame.kind)).increment(1);

        match self.router.route(&frame.kind) {
            FrameRoute::Silent => {
                debug!(generation = %id, frame = frame.summary().as_str(), "silent frame");
            }
            FrameRoute::Buffer => self.buffer_frame(&frame),
            FrameRoute::FanOut { buffer } => {
                let recipients = self.registry.dispatch(frame.event_type(), &frame.payload);
                debug!(
                    generation = %id,
                    event_type = frame.event_type(),
                    recipients,
                    "dispatched frame"
                );
                if buffer {
                    self.buffer_frame(&frame);
                }
                self.derive_notice(&frame);
            }
        }
    }

    fn buffer_frame(&self, frame: &EventFrame) {
        let entry = self.buffer.lock().push(frame);
        trace!(entry, event_type = frame.event_type(), "buffered frame");
    }

    fn derive_notice(&self, frame: &EventFrame) {
        if !frame.kind.is_domain() {
            return;
        }
        match RealtimeEvent::from_frame(frame) {
            Ok(event) => {
                if let Some(notice) = Notice::for_event(&event) {
                    self.notices.notify(&notice);
                }
            }
            Err(error) => debug!(event_type = frame.event_type(), %error, "no notice for payload"),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().take() {
            handle.cancel.cancel();
            debug!(generation = %handle.id, url = handle.request.url.as_str(), "connection manager dropped");
        }
    }
}

fn kind_label(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Connected => "connected",
        EventKind::Ping => "ping",
        EventKind::ReloadCreated => "reload_created",
        EventKind::ReloadApproved => "reload_approved",
        EventKind::ReloadStatus => "reload_status",
        EventKind::BalanceUpdated => "balance_updated",
        EventKind::DashboardRefresh => "dashboard_refresh",
        EventKind::Message => "message",
        EventKind::Other(_) => "other",
    }
}

/// Drive one connection: open it, then feed frames until it fails or is
/// cancelled. Holds the manager only weakly between frames.
async fn drive(
    shared: Weak<Shared>,
    id: ConnectionId,
    request: StreamRequest,
    cancel: CancellationToken,
) {
    let Some(transport) = shared.upgrade().map(|s| Arc::clone(&s.transport)) else {
        return;
    };

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(generation = %id, "connect cancelled before open");
            return;
        }
        result = transport.open(&request) => result,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(error) => {
            if let Some(shared) = shared.upgrade() {
                shared.on_failure(id, &error);
            }
            return;
        }
    };

    let accepted = shared.upgrade().is_some_and(|s| s.on_open(id));
    if !accepted {
        return;
    }

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(generation = %id, "connection cancelled");
                return;
            }
            item = stream.next() => item,
        };
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match item {
            Some(Ok(frame)) => shared.on_frame(id, frame),
            Some(Err(error)) => {
                shared.on_failure(id, &error);
                return;
            }
            None => {
                shared.on_failure(id, &TransportError::Closed);
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
