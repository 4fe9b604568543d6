//! # felt-sse
//!
//! Server-Sent Events plumbing for the Felt realtime client.
//!
//! - [`SseDecoder`] / [`frame_stream`]: incremental `text/event-stream` decoding
//! - [`Transport`]: opens a stream and hands back [`RawFrame`](felt_core::RawFrame)s
//! - [`HttpTransport`]: `reqwest` implementation
//! - [`mock::MockTransport`]: scripted implementation for tests

#![deny(unsafe_code)]

pub mod http;
pub mod mock;
pub mod parser;
pub mod transport;

pub use http::HttpTransport;
pub use parser::{SseDecoder, SseDecoderOptions, frame_stream};
pub use transport::{FrameStream, StreamRequest, Transport};
