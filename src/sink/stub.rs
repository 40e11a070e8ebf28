//! Stub sink, used for dry runs and builds without the `desktop` feature.
//!
//! Declines every action so the controller marks the status line as
//! unavailable while still running the full gesture pipeline.

use tracing::info;

use super::{ActionSink, Capabilities, SinkError};
use crate::gesture::Action;

/// No-op sink.
#[derive(Default)]
pub struct StubSink {
    declined: u64,
}

impl StubSink {
    pub fn new() -> Self {
        info!("action sink disabled (stub)");
        Self::default()
    }

    pub fn declined(&self) -> u64 {
        self.declined
    }
}

impl ActionSink for StubSink {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn execute(&mut self, action: &Action) -> Result<(), SinkError> {
        if action.is_noop() {
            return Ok(());
        }
        self.declined += 1;
        Err(SinkError::Unsupported(action.label()))
    }
}
