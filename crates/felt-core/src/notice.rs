//! User-facing notices derived from realtime events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::RealtimeEvent;

/// Balance changes at or below this magnitude are not announced.
pub const BALANCE_NOTICE_THRESHOLD: f64 = 0.01;

/// Severity of a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Neutral information.
    Info,
    /// Something good happened.
    Success,
    /// Something was refused or failed.
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// A short message for the user, typically rendered as a toast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub message: String,
}

impl Notice {
    /// Build a notice.
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Notice shown once per opened connection.
    pub fn connected() -> Self {
        Self::new(NoticeLevel::Success, "Connected in real time")
    }

    /// Notice for a typed event, if that event is announced at all.
    pub fn for_event(event: &RealtimeEvent) -> Option<Self> {
        match event {
            RealtimeEvent::ReloadCreated(reload) => Some(Self::new(
                NoticeLevel::Info,
                format!("New reload: {} - ${:.2}", reload.username, reload.amount),
            )),
            RealtimeEvent::ReloadApproved(reload) => Some(Self::new(
                NoticeLevel::Success,
                format!("Reload approved: {} - ${:.2}", reload.username, reload.amount),
            )),
            RealtimeEvent::ReloadStatus(status) => {
                let level = match status.status.as_str() {
                    "approved" => NoticeLevel::Success,
                    "rejected" => NoticeLevel::Error,
                    _ => NoticeLevel::Info,
                };
                let message = status
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Reload {}", status.status));
                Some(Self::new(level, message))
            }
            RealtimeEvent::BalanceUpdated(update) => {
                let diff = update.difference();
                if diff.abs() <= BALANCE_NOTICE_THRESHOLD {
                    return None;
                }
                let sign = if diff > 0.0 { '+' } else { '-' };
                Some(Self::new(
                    NoticeLevel::Info,
                    format!("Balance updated: {sign}${:.2}", diff.abs()),
                ))
            }
            RealtimeEvent::Connected(_)
            | RealtimeEvent::Ping(_)
            | RealtimeEvent::DashboardRefresh(_)
            | RealtimeEvent::Message(_)
            | RealtimeEvent::Other { .. } => None,
        }
    }
}
