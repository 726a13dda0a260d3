//! Single-shot timers for the dispatch loop
//!
//! The engine owns two tagged timers: one bounding the single outstanding
//! driver command, one shared across the whole firmware send window. Arming
//! is requested through [`TimerScheduler`] so tests can substitute a manual
//! clock; fires come back into the loop as ordinary messages carrying a
//! generation counter, which makes a stale fire after re-arm or cancel
//! trivially detectable.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::channel::ServiceMessage;

/// Bound on every tracked driver command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound shared by the entire firmware send window.
pub const SEND_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Timer Tags
// ----------------------------------------------------------------------------

/// Identifies which single-shot timer a fire belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Driver command timeout
    Command,
    /// Firmware send-window timeout
    SendMessage,
}

// ----------------------------------------------------------------------------
// Scheduler Seam
// ----------------------------------------------------------------------------

/// Arms and cancels the tagged single-shot timers.
pub trait TimerScheduler: Send {
    /// Arm (or re-arm) the timer behind `tag`. A later fire must carry the
    /// same generation to be honored.
    fn arm(&mut self, tag: TimerTag, generation: u64, after: Duration);

    /// Cancel the timer behind `tag`, if armed.
    fn cancel(&mut self, tag: TimerTag);
}

// ----------------------------------------------------------------------------
// Tokio Implementation
// ----------------------------------------------------------------------------

/// Production scheduler: each armed timer is a spawned sleep that posts a
/// `TimerFired` message back into the loop.
pub struct TokioTimers {
    sender: UnboundedSender<ServiceMessage>,
    handles: HashMap<TimerTag, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(sender: UnboundedSender<ServiceMessage>) -> Self {
        Self {
            sender,
            handles: HashMap::new(),
        }
    }
}

impl TimerScheduler for TokioTimers {
    fn arm(&mut self, tag: TimerTag, generation: u64, after: Duration) {
        if let Some(handle) = self.handles.remove(&tag) {
            handle.abort();
        }
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = sender.send(ServiceMessage::TimerFired { tag, generation });
        });
        self.handles.insert(tag, handle);
    }

    fn cancel(&mut self, tag: TimerTag) {
        if let Some(handle) = self.handles.remove(&tag) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for handle in self.handles.values() {
            handle.abort();
        }
    }
}
