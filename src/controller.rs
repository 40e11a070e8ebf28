//! Gesture controller: the engine wired to an action sink.
//!
//! Runs one frame through the engine, gates every resulting command on
//! the sink's capabilities, executes what is allowed, and turns the
//! result into a status line.  Sink failures never stop the pipeline.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::gesture::frame_timing::FrameTiming;
use crate::gesture::{Action, EngineConfig, FrameInput, FrameOutcome, GestureEngine};
use crate::sink::{ActionSink, Capabilities, SinkError};

/// Appended to the status line when the sink did not perform the action.
pub const UNAVAILABLE_SUFFIX: &str = " (sink unavailable)";

/// Result of processing one frame end to end.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub status: String,
    /// Commands the sink performed.
    pub executed: Vec<Action>,
    /// Commands that were declined or failed.
    pub declined: Vec<(Action, SinkError)>,
    pub processing_ms: f64,
}

impl FrameReport {
    pub fn was_declined(&self, action: &Action) -> bool {
        self.declined.iter().any(|(a, _)| a == action)
    }
}

pub struct GestureController {
    pub engine: GestureEngine,
    sink: Box<dyn ActionSink>,
    capabilities: Capabilities,
    pub timing: FrameTiming,
    sink_failures: u64,
    refused_actions: u64,
    last_report: Option<FrameReport>,
}

impl GestureController {
    /// Build a controller.  Screen size comes from `screen_override`,
    /// else the sink, else the smoothing default.
    pub fn new(
        mut config: EngineConfig,
        sink: Box<dyn ActionSink>,
        screen_override: Option<(u32, u32)>,
    ) -> Self {
        if let Some((w, h)) = screen_override.or_else(|| sink.screen_size()) {
            config.smoothing.screen_width = w;
            config.smoothing.screen_height = h;
        }
        let capabilities = sink.capabilities();
        info!(
            sink = sink.name(),
            screen_width = config.smoothing.screen_width,
            screen_height = config.smoothing.screen_height,
            "gesture controller ready, capabilities {}",
            capabilities.to_sexp()
        );

        Self {
            engine: GestureEngine::new(config),
            sink,
            capabilities,
            timing: FrameTiming::default(),
            sink_failures: 0,
            refused_actions: 0,
            last_report: None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }

    /// Actions withheld because the sink lacks the capability.
    pub fn refused_actions(&self) -> u64 {
        self.refused_actions
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Process one frame at `now_ms`.
    pub fn process_frame(&mut self, input: &FrameInput, now_ms: f64) -> FrameReport {
        let started = Instant::now();
        let outcome = self.engine.process(input, now_ms);

        let mut executed = Vec::new();
        let mut declined = Vec::new();
        for action in outcome.commands() {
            match self.dispatch(&action) {
                Ok(()) => executed.push(action),
                Err(e) => declined.push((action, e)),
            }
        }

        let mut status = outcome.status_text();
        if let Some(headline) = outcome.headline_action() {
            if declined.iter().any(|(a, _)| *a == headline) {
                status.push_str(UNAVAILABLE_SUFFIX);
            }
        }

        let processing_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.timing.record_frame(now_ms, processing_ms);
        debug!(status = %status, processing_ms, "frame processed");

        let report = FrameReport {
            outcome,
            status,
            executed,
            declined,
            processing_ms,
        };
        self.last_report = Some(report.clone());
        report
    }

    fn dispatch(&mut self, action: &Action) -> Result<(), SinkError> {
        if !self.capabilities.allows(action) {
            self.refused_actions += 1;
            debug!(action = action.label(), sink = self.sink.name(), "sink unavailable, action refused");
            return Err(SinkError::Unsupported(action.label()));
        }
        self.sink.execute(action).map_err(|e| {
            self.sink_failures += 1;
            warn!(action = action.label(), "sink failed: {}", e);
            e
        })
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self) -> String {
        let (status, hand, gesture, cursor) = match &self.last_report {
            Some(r) => (
                r.status.as_str(),
                match r.outcome.hand {
                    crate::gesture::HandStatus::NoHand => "none",
                    crate::gesture::HandStatus::Malformed(_) => "malformed",
                    crate::gesture::HandStatus::Present => "present",
                },
                r.outcome.gesture().map(|g| g.as_str()).unwrap_or("nil"),
                r.outcome
                    .cursor
                    .map(|c| format!("(:x {} :y {})", c.x, c.y))
                    .unwrap_or_else(|| "nil".to_string()),
            ),
            None => ("No Hand Detected", "none", "nil", "nil".to_string()),
        };
        let gesture = if gesture == "nil" {
            gesture.to_string()
        } else {
            format!(":{}", gesture)
        };
        format!(
            "(:status \"{}\" :hand :{} :gesture {} :cursor {} :scrolling {} :sink \"{}\" :sink-failures {} :refused {})",
            crate::ipc::escape_string(status),
            hand,
            gesture,
            cursor,
            if self.engine.scroll_reference().is_some() { "t" } else { "nil" },
            self.sink.name(),
            self.sink_failures,
            self.refused_actions,
        )
    }
}
