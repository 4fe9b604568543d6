//! The object a host mounts: connects when built, disconnects when dropped.

use std::sync::Arc;

use felt_core::DomainEvent;
use felt_settings::RealtimeSettings;
use felt_sse::{HttpTransport, Transport};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::buffer::BufferEntry;
use crate::errors::Result;
use crate::manager::{ConnectOutcome, ConnectionManager};
use crate::notices::{NoticeSink, TracingNoticeSink};
use crate::registry::{DispatchRegistry, Subscription};
use crate::resilience::EnvironmentSignal;
use crate::state::ConnectionState;

/// Builder for [`RealtimeClient`].
pub struct RealtimeClientBuilder {
    settings: RealtimeSettings,
    transport: Option<Arc<dyn Transport>>,
    notices: Option<Arc<dyn NoticeSink>>,
    registry: Option<DispatchRegistry>,
    auto_connect: bool,
}

impl RealtimeClientBuilder {
    /// Use `transport` instead of the HTTP transport built from settings.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use an already shared transport.
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Deliver notices to `sink` instead of the log.
    #[must_use]
    pub fn notices(mut self, sink: impl NoticeSink) -> Self {
        self.notices = Some(Arc::new(sink));
        self
    }

    /// Dispatch through an existing registry, keeping its listeners.
    #[must_use]
    pub fn registry(mut self, registry: DispatchRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Whether `build` connects right away. Defaults to `true`.
    #[must_use]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Validate settings, create the manager and (by default) connect.
    ///
    /// Fails if settings are invalid, the HTTP client cannot be created, or
    /// no Tokio runtime is running.
    pub fn build(self) -> Result<RealtimeClient> {
        self.settings.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_settings(&self.settings)?),
        };
        let notices = self
            .notices
            .unwrap_or_else(|| Arc::new(TracingNoticeSink));
        let registry = self.registry.unwrap_or_default();

        let manager = ConnectionManager::new(&self.settings, transport, registry, notices)?;
        let client = RealtimeClient { manager };
        if self.auto_connect {
            let outcome = client.manager.connect();
            info!(generation = %outcome.connection_id(), "realtime client mounted");
        } else {
            debug!("realtime client built without connecting");
        }
        Ok(client)
    }
}

/// Realtime event client.
///
/// Dropping it disconnects, which closes the stream exactly once.
#[derive(Debug)]
pub struct RealtimeClient {
    manager: ConnectionManager,
}

impl RealtimeClient {
    /// Start building a client.
    pub fn builder(settings: RealtimeSettings) -> RealtimeClientBuilder {
        RealtimeClientBuilder {
            settings,
            transport: None,
            notices: None,
            registry: None,
            auto_connect: true,
        }
    }

    /// Current connectivity.
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Receiver for connectivity changes.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.manager.connectivity()
    }

    /// The dispatch registry.
    pub fn listeners(&self) -> &DispatchRegistry {
        self.manager.registry()
    }

    /// Shorthand for [`DispatchRegistry::add_event_listener`].
    pub fn add_event_listener<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.manager.registry().add_event_listener(event_type, callback)
    }

    /// Shorthand for [`DispatchRegistry::add_typed_listener`].
    pub fn add_typed_listener<E, F>(&self, callback: F) -> Subscription
    where
        E: DomainEvent + 'static,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.manager.registry().add_typed_listener::<E, F>(callback)
    }

    /// Recently buffered generic frames, oldest first.
    pub fn recent_events(&self) -> Vec<BufferEntry> {
        self.manager.recent_events()
    }

    /// See [`ConnectionManager::connect`].
    pub fn connect(&self) -> ConnectOutcome {
        self.manager.connect()
    }

    /// See [`ConnectionManager::disconnect`].
    pub fn disconnect(&self) -> bool {
        self.manager.disconnect()
    }

    /// See [`ConnectionManager::handle_signal`].
    pub fn handle_signal(&self, signal: EnvironmentSignal) -> Option<ConnectOutcome> {
        self.manager.handle_signal(signal)
    }

    /// Lifecycle state of the current connection.
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Last SSE `id` seen on the stream.
    pub fn last_event_id(&self) -> Option<String> {
        self.manager.last_event_id()
    }

    /// The underlying manager.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if self.manager.disconnect() {
            debug!("realtime client unmounted");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RealtimeError;
    use crate::notices::RecordingNoticeSink;
    use assert_matches::assert_matches;
    use felt_core::{NoticeLevel, ReloadCreated};
    use felt_sse::mock::MockTransport;
    use parking_lot::Mutex;
    use serde_json::json;

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn client(transport: &MockTransport, notices: &RecordingNoticeSink) -> RealtimeClient {
        RealtimeClient::builder(RealtimeSettings::default())
            .transport(transport.clone())
            .notices(notices.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn build_connects_immediately() {
        let transport = MockTransport::new();
        let notices = RecordingNoticeSink::new();
        let client = client(&transport, &notices);
        assert_eq!(client.state(), ConnectionState::Connecting);

        settle().await;
        assert!(client.is_connected());
        assert_eq!(transport.attempt_count(), 1);
        assert_eq!(notices.notices()[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn auto_connect_can_be_disabled() {
        let transport = MockTransport::new();
        let client = RealtimeClient::builder(RealtimeSettings::default())
            .transport(transport.clone())
            .notices(RecordingNoticeSink::new())
            .auto_connect(false)
            .build()
            .unwrap();
        settle().await;
        assert_eq!(transport.attempt_count(), 0);
        assert_eq!(client.state(), ConnectionState::Idle);

        assert!(client.connect().is_started());
    }

    #[tokio::test]
    async fn drop_closes_connection_exactly_once() {
        let transport = MockTransport::new();
        let client = client(&transport, &RecordingNoticeSink::new());
        settle().await;
        let conn = transport.latest().unwrap();

        drop(client);
        settle().await;
        assert!(conn.is_closed());
        assert_eq!(transport.close_count(), 1);
        assert_eq!(transport.live_count(), 0);
    }

    #[tokio::test]
    async fn drop_after_disconnect_closes_once() {
        let transport = MockTransport::new();
        let client = client(&transport, &RecordingNoticeSink::new());
        settle().await;

        assert!(client.disconnect());
        drop(client);
        settle().await;
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn typed_listener_receives_payload() {
        let transport = MockTransport::new();
        let client = client(&transport, &RecordingNoticeSink::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            client.add_typed_listener(move |reload: ReloadCreated| seen.lock().push(reload.username))
        };
        settle().await;

        let conn = transport.latest().unwrap();
        assert!(conn.send_json("reload_created", &json!({"username": "caio", "amount": 20})));
        settle().await;
        assert_eq!(*seen.lock(), vec!["caio".to_string()]);
    }

    #[tokio::test]
    async fn shared_registry_keeps_listeners() {
        let registry = DispatchRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let _sub = {
            let hits = Arc::clone(&hits);
            registry.add_event_listener("dashboard_refresh", move |_| *hits.lock() += 1)
        };

        let transport = MockTransport::new();
        let client = RealtimeClient::builder(RealtimeSettings::default())
            .transport(transport.clone())
            .registry(registry.clone())
            .build()
            .unwrap();
        settle().await;

        assert!(transport.latest().unwrap().send("dashboard_refresh", "{}"));
        settle().await;
        assert_eq!(*hits.lock(), 1);
        assert_eq!(client.listeners().listener_count("dashboard_refresh"), 1);
    }

    #[tokio::test]
    async fn invalid_settings_rejected() {
        let result = RealtimeClient::builder(RealtimeSettings {
            buffer_capacity: 0,
            ..RealtimeSettings::default()
        })
        .transport(MockTransport::new())
        .build();
        assert_matches!(result, Err(RealtimeError::Settings(_)));
    }

    #[test]
    fn build_outside_runtime_fails() {
        let result = RealtimeClient::builder(RealtimeSettings::default())
            .transport(MockTransport::new())
            .build();
        assert_matches!(result, Err(RealtimeError::NoRuntime));
    }
}
