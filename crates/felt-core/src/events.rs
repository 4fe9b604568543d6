//! Event kinds and typed payloads.
//!
//! The stream carries a handful of named event types. [`EventKind`] is the
//! routing key; the payload structs are permissive views used only where a
//! consumer wants typed access. Unknown fields are ignored so the backend can
//! grow payloads without breaking older clients.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DecodeError;
use crate::frame::EventFrame;

/// Routing key of a frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Server greeting sent once per opened stream.
    Connected,
    /// Keep-alive.
    Ping,
    /// A reload request was created.
    ReloadCreated,
    /// A reload request was approved.
    ReloadApproved,
    /// A reload request changed status.
    ReloadStatus,
    /// An account balance changed.
    BalanceUpdated,
    /// Dashboards should refetch their data.
    DashboardRefresh,
    /// Untyped frame (no `event` field).
    Message,
    /// Named type this client does not know about.
    Other(String),
}

impl EventKind {
    /// Map the SSE `event` field to a kind. A missing field means `message`.
    #[must_use]
    pub fn from_event_field(field: Option<&str>) -> Self {
        field.map_or(Self::Message, Self::from_name)
    }

    /// Map an event type name to a kind.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "connected" => Self::Connected,
            "ping" => Self::Ping,
            "reload_created" => Self::ReloadCreated,
            "reload_approved" => Self::ReloadApproved,
            "reload_status" => Self::ReloadStatus,
            "balance_updated" => Self::BalanceUpdated,
            "dashboard_refresh" => Self::DashboardRefresh,
            "message" | "" => Self::Message,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Ping => "ping",
            Self::ReloadCreated => "reload_created",
            Self::ReloadApproved => "reload_approved",
            Self::ReloadStatus => "reload_status",
            Self::BalanceUpdated => "balance_updated",
            Self::DashboardRefresh => "dashboard_refresh",
            Self::Message => "message",
            Self::Other(name) => name,
        }
    }

    /// Whether this is one of the business events subscribers care about.
    #[must_use]
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::ReloadCreated
                | Self::ReloadApproved
                | Self::ReloadStatus
                | Self::BalanceUpdated
                | Self::DashboardRefresh
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server timestamp as sent on the wire.
///
/// The backend stamps events with Unix epoch seconds (a float); ISO 8601
/// strings are accepted too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Seconds since the Unix epoch.
    Epoch(f64),
    /// ISO 8601 / RFC 3339 text.
    Iso(String),
}

impl Timestamp {
    /// Convert to UTC. `None` if out of range or unparseable.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(secs) if secs.is_finite() => {
                #[allow(clippy::cast_possible_truncation)]
                let millis = (secs * 1000.0).round() as i64;
                DateTime::from_timestamp_millis(millis)
            }
            Self::Epoch(_) => None,
            Self::Iso(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
        }
    }
}

/// A payload type bound to one event type name.
pub trait DomainEvent: DeserializeOwned {
    /// Event type name on the wire.
    const NAME: &'static str;
}

/// `connected` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connected {
    /// Greeting text.
    pub message: Option<String>,
    /// Server timestamp.
    pub timestamp: Option<Timestamp>,
}

/// `ping` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ping {
    /// Server timestamp.
    pub timestamp: Option<Timestamp>,
}

/// `reload_created` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReloadCreated {
    /// Reload request ID.
    #[serde(default)]
    pub id: Option<i64>,
    /// Requesting user.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Requesting user's display name.
    pub username: String,
    /// Poker platform the reload is for.
    #[serde(default)]
    pub platform_name: Option<String>,
    /// Requested amount.
    pub amount: f64,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// `reload_approved` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReloadApproved {
    /// Reload request ID.
    #[serde(default)]
    pub id: Option<i64>,
    /// Requesting user's display name.
    pub username: String,
    /// Approved amount.
    pub amount: f64,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// `reload_status` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReloadStatus {
    /// Reload request ID.
    #[serde(default)]
    pub id: Option<i64>,
    /// New status (`approved`, `rejected`, ...).
    pub status: String,
    /// Human readable description of the change.
    #[serde(default)]
    pub message: Option<String>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// `balance_updated` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdated {
    /// Account whose balance changed.
    #[serde(default)]
    pub account_id: Option<i64>,
    /// Account owner.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Balance before the change.
    pub old_balance: f64,
    /// Balance after the change.
    pub new_balance: f64,
    /// Amount of the change as reported by the server.
    #[serde(default)]
    pub change_amount: Option<f64>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl BalanceUpdated {
    /// `new_balance - old_balance`.
    #[must_use]
    pub fn difference(&self) -> f64 {
        self.new_balance - self.old_balance
    }
}

/// `dashboard_refresh` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardRefresh {
    /// Server timestamp.
    pub timestamp: Option<Timestamp>,
}

impl DomainEvent for Connected {
    const NAME: &'static str = "connected";
}

impl DomainEvent for Ping {
    const NAME: &'static str = "ping";
}

impl DomainEvent for ReloadCreated {
    const NAME: &'static str = "reload_created";
}

impl DomainEvent for ReloadApproved {
    const NAME: &'static str = "reload_approved";
}

impl DomainEvent for ReloadStatus {
    const NAME: &'static str = "reload_status";
}

impl DomainEvent for BalanceUpdated {
    const NAME: &'static str = "balance_updated";
}

impl DomainEvent for DashboardRefresh {
    const NAME: &'static str = "dashboard_refresh";
}

/// A decoded frame viewed through its typed payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeEvent {
    /// Server greeting.
    Connected(Connected),
    /// Keep-alive.
    Ping(Ping),
    /// Reload created.
    ReloadCreated(ReloadCreated),
    /// Reload approved.
    ReloadApproved(ReloadApproved),
    /// Reload status changed.
    ReloadStatus(ReloadStatus),
    /// Balance changed.
    BalanceUpdated(BalanceUpdated),
    /// Dashboards should refetch.
    DashboardRefresh(DashboardRefresh),
    /// Untyped message.
    Message(Value),
    /// Unknown named type.
    Other {
        /// Event type name.
        name: String,
        /// Raw payload.
        payload: Value,
    },
}

impl RealtimeEvent {
    /// Interpret a decoded frame according to its kind.
    pub fn from_frame(frame: &EventFrame) -> Result<Self, DecodeError> {
        let event = match &frame.kind {
            EventKind::Connected => Self::Connected(typed(frame)?),
            EventKind::Ping => Self::Ping(typed(frame)?),
            EventKind::ReloadCreated => Self::ReloadCreated(typed(frame)?),
            EventKind::ReloadApproved => Self::ReloadApproved(typed(frame)?),
            EventKind::ReloadStatus => Self::ReloadStatus(typed(frame)?),
            EventKind::BalanceUpdated => Self::BalanceUpdated(typed(frame)?),
            EventKind::DashboardRefresh => Self::DashboardRefresh(typed(frame)?),
            EventKind::Message => Self::Message(frame.payload.clone()),
            EventKind::Other(name) => Self::Other {
                name: name.clone(),
                payload: frame.payload.clone(),
            },
        };
        Ok(event)
    }

    /// Kind of the underlying frame.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::Ping(_) => EventKind::Ping,
            Self::ReloadCreated(_) => EventKind::ReloadCreated,
            Self::ReloadApproved(_) => EventKind::ReloadApproved,
            Self::ReloadStatus(_) => EventKind::ReloadStatus,
            Self::BalanceUpdated(_) => EventKind::BalanceUpdated,
            Self::DashboardRefresh(_) => EventKind::DashboardRefresh,
            Self::Message(_) => EventKind::Message,
            Self::Other { name, .. } => EventKind::Other(name.clone()),
        }
    }
}

/// Deserialize a payload into a typed event, tagging failures with the type name.
pub fn decode_payload<E: DomainEvent>(payload: &Value) -> Result<E, DecodeError> {
    E::deserialize(payload).map_err(|source| DecodeError::PayloadShape {
        event_type: E::NAME.to_string(),
        source,
    })
}

fn typed<E: DomainEvent>(frame: &EventFrame) -> Result<E, DecodeError> {
    decode_payload(&frame.payload)
}
