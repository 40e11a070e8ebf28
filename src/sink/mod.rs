//! Action sinks: where engine actions meet the operating system.
//!
//! The engine never touches the OS.  A sink reports which action kinds
//! it can perform (queried once at start) and executes them one at a
//! time.  Failures are reported, never fatal.

pub mod stub;
pub mod system_controls;

#[cfg(feature = "desktop")]
pub mod desktop;

use std::fmt;

use tracing::info;

use crate::gesture::Action;

pub use stub::StubSink;

/// Sink failure for a single action.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkError {
    /// The sink does not perform this kind of action.
    Unsupported(&'static str),
    /// The OS call failed.
    Backend(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(label) => write!(f, "{} not supported by this sink", label),
            Self::Backend(msg) => write!(f, "sink backend error: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

/// What a sink can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Cursor movement, clicks and scrolling.
    pub pointer: bool,
    /// Media keys.
    pub keys: bool,
    pub volume: bool,
    pub brightness: bool,
}

impl Capabilities {
    /// Whether `action` falls within these capabilities.
    pub fn allows(&self, action: &Action) -> bool {
        match action {
            Action::LeftClick
            | Action::RightClick
            | Action::ScrollUp { .. }
            | Action::ScrollDown { .. }
            | Action::MoveCursor { .. } => self.pointer,
            Action::MediaPlayPause | Action::MediaNext => self.keys,
            Action::SetVolume(_) => self.volume,
            Action::SetBrightness(_) => self.brightness,
            Action::Tracking => true,
        }
    }

    pub fn any(&self) -> bool {
        self.pointer || self.keys || self.volume || self.brightness
    }

    /// Generate s-expression for IPC.
    pub fn to_sexp(&self) -> String {
        let b = |v: bool| if v { "t" } else { "nil" };
        format!(
            "(:pointer {} :keys {} :volume {} :brightness {})",
            b(self.pointer),
            b(self.keys),
            b(self.volume),
            b(self.brightness),
        )
    }
}

/// OS side-effect interface.
pub trait ActionSink {
    /// Short name for logs and IPC.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Perform one action.  `Tracking` is always `Ok`.
    fn execute(&mut self, action: &Action) -> Result<(), SinkError>;

    /// Primary display size in pixels, if the sink can tell.
    fn screen_size(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Build the sink for this run.
///
/// `dry_run` forces the stub.  Without the `desktop` feature the stub is
/// the only sink; with it, a desktop sink that fails to connect falls
/// back to the stub.
pub fn create_sink(dry_run: bool) -> Box<dyn ActionSink> {
    if dry_run {
        info!("dry run: actions will be reported but not performed");
        return Box::new(StubSink::new());
    }

    #[cfg(feature = "desktop")]
    {
        match desktop::DesktopSink::new() {
            Ok(sink) => return Box::new(sink),
            Err(e) => tracing::warn!("desktop sink unavailable, falling back to stub: {}", e),
        }
    }

    Box::new(StubSink::new())
}

// ── Test helpers ───────────────────────────────────────────

/// Sink that records every executed action.
#[cfg(test)]
pub(crate) struct RecordingSink {
    pub caps: Capabilities,
    pub executed: Vec<Action>,
    /// When set, every non-Tracking action fails with this message.
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            executed: Vec::new(),
            fail_with: None,
        }
    }

    pub(crate) fn full() -> Self {
        Self::new(Capabilities {
            pointer: true,
            keys: true,
            volume: true,
            brightness: true,
        })
    }
}

#[cfg(test)]
impl ActionSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn execute(&mut self, action: &Action) -> Result<(), SinkError> {
        if let Some(msg) = &self.fail_with {
            return Err(SinkError::Backend(msg.clone()));
        }
        self.executed.push(*action);
        Ok(())
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        Some((2560, 1440))
    }
}
