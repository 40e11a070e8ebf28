//! Single-slot frame queue between the IPC readers and the engine.
//!
//! The engine always works on the newest frame.  A frame that arrives
//! before the previous one was processed replaces it and is counted as
//! dropped, so a slow sink never builds up a backlog.

use crate::gesture::FrameInput;

/// A frame received from a client, not yet processed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFrame {
    pub input: FrameInput,
    /// Estimator timestamp, when the client sent one.
    pub timestamp_ms: Option<f64>,
    pub client_id: u64,
}

#[derive(Debug, Default)]
pub struct FrameSlot {
    pending: Option<PendingFrame>,
    received: u64,
    dropped: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any unprocessed one.  Returns true when
    /// a frame was dropped.
    pub fn push(&mut self, frame: PendingFrame) -> bool {
        self.received += 1;
        let replaced = self.pending.replace(frame).is_some();
        if replaced {
            self.dropped += 1;
        }
        replaced
    }

    pub fn take(&mut self) -> Option<PendingFrame> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Generate s-expression for IPC.
    pub fn stats_sexp(&self) -> String {
        format!(
            "(:received {} :dropped {} :pending {})",
            self.received,
            self.dropped,
            if self.is_pending() { "t" } else { "nil" },
        )
    }
}
