//! # SSE decoder
//!
//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks. The decoder buffers them, splits on `\n`
//! (dropping an optional trailing `\r`), and assembles fields into
//! [`RawFrame`]s:
//! - lines starting with `:` are comments
//! - `event`, `data` and `id` fields are recognised; `data` lines are joined
//!   with `\n`
//! - one space after the colon is stripped
//! - a blank line dispatches the pending event if any `data` was seen
//! - `retry` and unknown fields are ignored
//!
//! The `id` persists across events until the server changes it, so every
//! frame carries the last event ID seen so far.
//!
//! A partial line longer than [`SseDecoderOptions::max_line_len`] abandons
//! the stream instead of buffering without bound.

use std::collections::VecDeque;
use std::fmt;

use bytes::{Bytes, BytesMut};
use felt_core::{RawFrame, TransportError};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, trace, warn};

/// Default cap on a single buffered line (1 MiB).
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Options for the SSE decoder.
#[derive(Clone, Debug)]
pub struct SseDecoderOptions {
    /// Dispatch an event left incomplete when the stream ends.
    /// Default: `false` (a browser event source discards it).
    pub dispatch_trailing_event: bool,
    /// Longest line, in bytes, held while waiting for its newline.
    pub max_line_len: usize,
}

impl Default for SseDecoderOptions {
    fn default() -> Self {
        Self {
            dispatch_trailing_event: false,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: String,
    has_data: bool,
}

/// Stateful decoder turning byte chunks into frames.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already searched for a newline.
    scanned: usize,
    overflowed: bool,
    pending: PendingEvent,
    last_event_id: Option<String>,
    seen_first_line: bool,
    options: SseDecoderOptions,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(SseDecoderOptions::default())
    }
}

impl SseDecoder {
    /// Create a decoder.
    pub fn new(options: SseDecoderOptions) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            overflowed: false,
            pending: PendingEvent::default(),
            last_event_id: None,
            seen_first_line: false,
            options,
        }
    }

    /// Last `id` field seen.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Whether a line outgrew [`SseDecoderOptions::max_line_len`]. Once set,
    /// further input is ignored.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Append a chunk and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        if self.overflowed {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let newline_pos = self.scanned + offset;
            self.scanned = 0;
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }

            let Ok(line) = std::str::from_utf8(&line_bytes) else {
                warn!(len = line_bytes.len(), "skipping SSE line with invalid UTF-8");
                continue;
            };
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        self.scanned = self.buffer.len();
        if self.buffer.len() > self.options.max_line_len {
            warn!(
                len = self.buffer.len(),
                max = self.options.max_line_len,
                "SSE line exceeds limit, abandoning stream"
            );
            self.overflowed = true;
            self.buffer.clear();
            self.scanned = 0;
        }
        frames
    }

    /// Flush at end of stream.
    ///
    /// An unterminated final line is still applied as a field. The pending
    /// event is dispatched only when [`SseDecoderOptions::dispatch_trailing_event`]
    /// is set.
    pub fn finish(&mut self) -> Option<RawFrame> {
        if self.overflowed {
            return None;
        }
        self.scanned = 0;
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let trimmed = rest.strip_suffix(b"\r").unwrap_or(&rest[..]);
            match std::str::from_utf8(trimmed) {
                Ok(line) => {
                    let _ = self.process_line(line);
                }
                Err(_) => warn!(len = rest.len(), "skipping SSE line with invalid UTF-8"),
            }
        }

        let pending = std::mem::take(&mut self.pending);
        if !pending.has_data {
            return None;
        }
        if self.options.dispatch_trailing_event {
            Some(self.build_frame(pending))
        } else {
            debug!(event = ?pending.event, "discarding incomplete trailing SSE event");
            None
        }
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        let line = if self.seen_first_line {
            line
        } else {
            self.seen_first_line = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            trace!("SSE comment");
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => {
                if self.pending.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.pending.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = (!value.is_empty()).then(|| value.to_string());
                }
            }
            "retry" => trace!(value, "ignoring SSE retry field"),
            other => trace!(field = other, "ignoring unknown SSE field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let pending = std::mem::take(&mut self.pending);
        pending.has_data.then(|| self.build_frame(pending))
    }

    fn build_frame(&self, pending: PendingEvent) -> RawFrame {
        RawFrame {
            event: pending.event.filter(|e| !e.is_empty()),
            data: pending.data,
            id: self.last_event_id.clone(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Overflowed,
    Closing,
    Done,
}

/// Decode a byte stream into frames.
///
/// Yields `Err(TransportError::Read)` if the underlying stream fails or a
/// line exceeds the configured limit, and `Err(TransportError::Closed)` once
/// it ends; nothing follows either error.
pub fn frame_stream<S, E>(
    byte_stream: S,
    options: SseDecoderOptions,
) -> impl Stream<Item = Result<RawFrame, TransportError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display,
{
    futures::stream::unfold(
        (
            Box::pin(byte_stream),
            SseDecoder::new(options),
            VecDeque::new(),
            Phase::Reading,
        ),
        |(mut stream, mut decoder, mut ready, mut phase)| async move {
            loop {
                if let Some(frame) = ready.pop_front() {
                    return Some((Ok(frame), (stream, decoder, ready, phase)));
                }
                match phase {
                    Phase::Done => return None,
                    Phase::Overflowed => {
                        let error = TransportError::Read(format!(
                            "SSE line exceeds {} bytes",
                            decoder.options.max_line_len
                        ));
                        return Some((Err(error), (stream, decoder, ready, Phase::Done)));
                    }
                    Phase::Closing => {
                        let error = TransportError::Closed;
                        return Some((Err(error), (stream, decoder, ready, Phase::Done)));
                    }
                    Phase::Reading => {}
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(decoder.feed(&chunk));
                        if decoder.is_overflowed() {
                            phase = Phase::Overflowed;
                        }
                    }
                    Some(Err(e)) => {
                        let error = TransportError::Read(e.to_string());
                        return Some((Err(error), (stream, decoder, ready, Phase::Done)));
                    }
                    None => {
                        if let Some(frame) = decoder.finish() {
                            return Some((Ok(frame), (stream, decoder, ready, Phase::Closing)));
                        }
                        let error = TransportError::Closed;
                        return Some((Err(error), (stream, decoder, ready, Phase::Done)));
                    }
                }
            }
        },
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
