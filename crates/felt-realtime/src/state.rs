//! Connection lifecycle states and the transitions between them.
//!
//! ```text
//! idle ──connect──► connecting ──opened──► open
//!                      ▲    │                │
//!            connect / │    └─────failed─────┤
//!            retry due │                     ▼
//!                      └──────────────── closed
//!
//! any ──disconnect──► idle
//! ```

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the stream connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection handle.
    Idle,
    /// Stream requested, not yet accepted.
    Connecting,
    /// Stream accepted and delivering frames.
    Open,
    /// Stream failed; a reconnect is pending.
    Closed,
}

/// Something that happened to the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Explicit connect request (mount, focus, visibility).
    Connect,
    /// The server accepted the stream.
    Opened,
    /// Open failure, read error or end of stream.
    Failed,
    /// The reconnect delay elapsed for this connection.
    RetryDue,
    /// Explicit teardown.
    Disconnect,
}

impl ConnectionState {
    /// Next state, or `None` if the event does not apply in this state.
    pub fn transition(self, event: LifecycleEvent) -> Option<Self> {
        use self::ConnectionState::{Closed, Connecting, Idle, Open};
        use self::LifecycleEvent::{Connect, Disconnect, Failed, Opened, RetryDue};

        match (self, event) {
            (Idle | Closed, Connect) | (Closed, RetryDue) => Some(Connecting),
            (Connecting, Opened) => Some(Open),
            (Connecting | Open, Failed) => Some(Closed),
            (_, Disconnect) => Some(Idle),
            _ => None,
        }
    }

    /// Whether a stream is being opened or is open.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}
