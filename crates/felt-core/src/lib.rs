//! # felt-core
//!
//! Shared vocabulary for the Felt realtime client.
//!
//! - **IDs**: [`ConnectionId`] and [`ListenerId`] newtypes
//! - **Frames**: [`RawFrame`] as read off the wire, [`EventFrame`] once decoded
//! - **Events**: [`EventKind`] for routing, typed payloads behind [`DomainEvent`]
//! - **Notices**: user-facing [`Notice`] values derived from domain events
//! - **Errors**: [`DecodeError`] and [`TransportError`] via `thiserror`
//! - **Logging**: `tracing` subscriber setup and capture helpers for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod notice;

pub use errors::{DecodeError, TransportError};
pub use events::{
    BalanceUpdated, Connected, DashboardRefresh, DomainEvent, EventKind, Ping, RealtimeEvent,
    ReloadApproved, ReloadCreated, ReloadStatus, Timestamp,
};
pub use frame::{EventFrame, RawFrame};
pub use ids::{ConnectionId, ListenerId};
pub use notice::{Notice, NoticeLevel};
