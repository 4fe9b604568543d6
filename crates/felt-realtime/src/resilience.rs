//! Opportunistic reconnection on host environment signals.
//!
//! The timer-based reconnect lives in the manager. This covers the other
//! path: a host regaining focus or becoming visible while the stream is down.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::manager::{ConnectOutcome, ConnectionManager};

/// Page or window visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Shown to the user.
    Visible,
    /// Backgrounded or minimized.
    Hidden,
}

/// Signal forwarded from the host environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "signal", content = "visibility", rename_all = "snake_case")]
pub enum EnvironmentSignal {
    /// The window gained focus.
    FocusGained,
    /// Visibility changed.
    VisibilityChanged(Visibility),
}

impl EnvironmentSignal {
    /// Whether the signal means the user is looking at the dashboard again.
    pub fn is_wake(self) -> bool {
        matches!(
            self,
            Self::FocusGained | Self::VisibilityChanged(Visibility::Visible)
        )
    }
}

impl ConnectionManager {
    /// React to a host signal.
    ///
    /// Reconnects when the signal is a wake-up, connectivity is down and no
    /// connection is connecting or open. Returns the connect outcome when a
    /// connect was attempted.
    pub fn handle_signal(&self, signal: EnvironmentSignal) -> Option<ConnectOutcome> {
        if !signal.is_wake() {
            return None;
        }
        if self.is_connected() || self.has_live_connection() {
            debug!(?signal, state = %self.state(), "signal ignored, stream healthy");
            return None;
        }
        debug!(?signal, "reconnecting on environment signal");
        Some(self.connect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::notices::RecordingNoticeSink;
    use crate::registry::DispatchRegistry;
    use crate::state::ConnectionState;
    use assert_matches::assert_matches;
    use felt_settings::RealtimeSettings;
    use felt_sse::mock::MockTransport;

    fn manager() -> (ConnectionManager, MockTransport) {
        let transport = MockTransport::new();
        let manager = ConnectionManager::new(
            &RealtimeSettings::default(),
            Arc::new(transport.clone()),
            DispatchRegistry::new(),
            Arc::new(RecordingNoticeSink::new()),
        )
        .unwrap();
        (manager, transport)
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn wake_signals() {
        assert!(EnvironmentSignal::FocusGained.is_wake());
        assert!(EnvironmentSignal::VisibilityChanged(Visibility::Visible).is_wake());
        assert!(!EnvironmentSignal::VisibilityChanged(Visibility::Hidden).is_wake());
    }

    #[test]
    fn signal_serde() {
        let json = serde_json::to_string(&EnvironmentSignal::VisibilityChanged(Visibility::Hidden)).unwrap();
        assert_eq!(json, r#"{"signal":"visibility_changed","visibility":"hidden"}"#);
        let back: EnvironmentSignal = serde_json::from_str(r#"{"signal":"focus_gained"}"#).unwrap();
        assert_eq!(back, EnvironmentSignal::FocusGained);
    }

    #[tokio::test]
    async fn focus_while_open_is_noop() {
        let (manager, transport) = manager();
        let _ = manager.connect();
        settle().await;

        assert_eq!(manager.handle_signal(EnvironmentSignal::FocusGained), None);
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn focus_while_connecting_is_noop() {
        let (manager, transport) = manager();
        let _ = manager.connect();

        assert_eq!(manager.handle_signal(EnvironmentSignal::FocusGained), None);
        settle().await;
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn hidden_never_connects() {
        let (manager, transport) = manager();
        assert_eq!(
            manager.handle_signal(EnvironmentSignal::VisibilityChanged(Visibility::Hidden)),
            None
        );
        settle().await;
        assert_eq!(transport.attempt_count(), 0);
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn visible_connects_when_idle() {
        let (manager, transport) = manager();
        let outcome = manager.handle_signal(EnvironmentSignal::VisibilityChanged(Visibility::Visible));
        assert_matches!(outcome, Some(ConnectOutcome::Started(_)));
        settle().await;
        assert!(manager.is_connected());
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_reconnects_before_timer_and_timer_is_then_stale() {
        let (manager, transport) = manager();
        let _ = manager.connect();
        settle().await;
        assert!(transport.latest().unwrap().fail("wifi dropped"));
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Closed);

        let outcome = manager.handle_signal(EnvironmentSignal::FocusGained);
        assert_matches!(outcome, Some(ConnectOutcome::Started(_)));
        settle().await;
        assert!(manager.is_connected());

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(transport.attempt_count(), 2);
        assert_eq!(transport.live_count(), 1);
    }
}
