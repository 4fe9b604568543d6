//! Delivery of user-facing notices.

use std::sync::Arc;

use felt_core::{Notice, NoticeLevel};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives notices derived from the stream (toasts in a UI host).
///
/// Called from the connection driver, never while internal locks are held.
pub trait NoticeSink: Send + Sync + 'static {
    /// Deliver one notice.
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log. Used when the host supplies no sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => warn!(level = %notice.level, text = notice.message.as_str(), "notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                info!(level = %notice.level, text = notice.message.as_str(), "notice");
            }
        }
    }
}

/// Keeps every notice in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingNoticeSink {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNoticeSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|n| n.message.clone()).collect()
    }
}

impl NoticeSink for RecordingNoticeSink {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

/// Forwards notices to a channel, e.g. a UI task.
impl NoticeSink for mpsc::UnboundedSender<Notice> {
    fn notify(&self, notice: &Notice) {
        if self.send(notice.clone()).is_err() {
            warn!("notice receiver dropped");
        }
    }
}
