//! Bounded log of the most recent generic messages.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use felt_core::EventFrame;
use serde::Serialize;
use serde_json::Value;

/// One buffered message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BufferEntry {
    /// Monotonic per-buffer sequence number.
    pub id: u64,
    /// Event type name (`message` for untyped frames).
    pub kind: String,
    /// Decoded payload.
    pub payload: Value,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

/// Most-recent-N buffer. The oldest entry is evicted first.
#[derive(Debug)]
pub struct RecencyBuffer {
    capacity: usize,
    entries: VecDeque<BufferEntry>,
    next_id: u64,
}

impl RecencyBuffer {
    /// Create a buffer holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            next_id: 1,
        }
    }

    /// Append a frame, evicting the oldest entry when full. Returns the entry ID.
    pub fn push(&mut self, frame: &EventFrame) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(BufferEntry {
            id,
            kind: frame.event_type().to_string(),
            payload: frame.payload.clone(),
            received_at: frame.received_at,
        });
        id
    }

    /// Owned copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<BufferEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use felt_core::RawFrame;

    fn message(n: u64) -> EventFrame {
        RawFrame::message(n.to_string()).decode(Utc::now()).unwrap()
    }

    #[test]
    fn keeps_most_recent_in_arrival_order() {
        let mut buffer = RecencyBuffer::new(100);
        for n in 0..150 {
            let _ = buffer.push(&message(n));
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(buffer.len(), 100);
        assert_eq!(snapshot[0].payload, serde_json::json!(50));
        assert_eq!(snapshot[99].payload, serde_json::json!(149));
        assert!(snapshot.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn ids_are_monotonic() {
        let mut buffer = RecencyBuffer::new(2);
        assert_eq!(buffer.push(&message(1)), 1);
        assert_eq!(buffer.push(&message(2)), 2);
        assert_eq!(buffer.push(&message(3)), 3);
        let ids: Vec<u64> = buffer.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut buffer = RecencyBuffer::new(5);
        let _ = buffer.push(&message(1));
        let snapshot = buffer.snapshot();
        let _ = buffer.push(&message(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn entry_records_kind_and_time() {
        let now = Utc::now();
        let frame = RawFrame::named("table_closed", "{}").decode(now).unwrap();
        let mut buffer = RecencyBuffer::new(5);
        let _ = buffer.push(&frame);
        let entry = &buffer.snapshot()[0];
        assert_eq!(entry.kind, "table_closed");
        assert_eq!(entry.received_at, now);
    }

    #[test]
    fn zero_capacity_clamped_to_one() {
        let mut buffer = RecencyBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_empty());
        let _ = buffer.push(&message(1));
        let _ = buffer.push(&message(2));
        assert_eq!(buffer.len(), 1);
    }
}
