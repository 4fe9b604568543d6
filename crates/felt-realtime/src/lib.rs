//! # felt-realtime
//!
//! Realtime event distribution for the Felt team dashboard.
//!
//! One long-lived event stream per client, fanned out to in-process
//! listeners by event type:
//!
//! - [`ConnectionManager`]: connection lifecycle, reconnect timer, frame routing
//! - [`DispatchRegistry`]: per-type listener lists with drop-to-detach [`Subscription`]s
//! - [`RecencyBuffer`]: bounded history of generic frames
//! - [`EnvironmentSignal`]: focus and visibility driven reconnects
//! - [`RealtimeClient`]: builder-made facade that connects on build and
//!   disconnects on drop

#![deny(unsafe_code)]

pub mod buffer;
pub mod client;
pub mod errors;
pub mod manager;
pub mod notices;
pub mod registry;
pub mod resilience;
pub mod router;
pub mod state;

pub use buffer::{BufferEntry, RecencyBuffer};
pub use client::{RealtimeClient, RealtimeClientBuilder};
pub use errors::{RealtimeError, Result};
pub use manager::{ConnectOutcome, ConnectionManager};
pub use notices::{NoticeSink, RecordingNoticeSink, TracingNoticeSink};
pub use registry::{DispatchRegistry, Subscription};
pub use resilience::{EnvironmentSignal, Visibility};
pub use router::{FrameRoute, FrameRouter};
pub use state::{ConnectionState, LifecycleEvent};
