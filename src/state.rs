//! Daemon state: the central struct the event loop hands to every
//! callback and IPC handler.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::controller::{FrameReport, GestureController};
use crate::ipc::{dispatch, FrameSlot, IpcServer};

/// Monotonic clock for frames that carry no estimator timestamp.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock {
    /// Milliseconds since the daemon started.
    pub fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Wall-clock milliseconds, for ping replies.
    pub fn unix_millis(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

/// Central daemon state.
pub struct PilotState {
    pub controller: GestureController,
    pub ipc_server: IpcServer,
    pub frame_slot: FrameSlot,
    pub clock: Clock,
    pub running: bool,
}

impl PilotState {
    pub fn new(controller: GestureController) -> Self {
        Self {
            controller,
            ipc_server: IpcServer::new(IpcServer::default_socket_path()),
            frame_slot: FrameSlot::new(),
            clock: Clock::default(),
            running: true,
        }
    }

    /// Process the queued frame, if any, and broadcast the result.
    pub fn process_pending_frame(&mut self) -> Option<FrameReport> {
        let frame = self.frame_slot.take()?;
        // One clock read per frame; every cooldown decision uses it.
        let now_ms = frame.timestamp_ms.unwrap_or_else(|| self.clock.now_ms());
        let report = self.controller.process_frame(&frame.input, now_ms);
        let event = dispatch::format_frame_event(&report);
        IpcServer::broadcast_event(self, &event);
        Some(report)
    }
}

#[cfg(test)]
pub(crate) fn make_state() -> PilotState {
    use crate::gesture::EngineConfig;
    use crate::sink::RecordingSink;

    let controller =
        GestureController::new(EngineConfig::default(), Box::new(RecordingSink::full()), None);
    let mut state = PilotState::new(controller);
    state.ipc_server.socket_path = std::env::temp_dir().join("handpilot-test.sock");
    state
}
