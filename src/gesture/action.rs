//! Normalized action vocabulary emitted by the engine.

/// One command for the OS sink, or the `Tracking` no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    LeftClick,
    RightClick,
    ScrollUp { amount: u32 },
    ScrollDown { amount: u32 },
    MediaPlayPause,
    MediaNext,
    /// Volume in [0, 1].
    SetVolume(f32),
    /// Brightness percent in [10, 100].
    SetBrightness(u8),
    MoveCursor { x: i32, y: i32 },
    Tracking,
}

impl Action {
    /// Label for IPC.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LeftClick => "left-click",
            Self::RightClick => "right-click",
            Self::ScrollUp { .. } => "scroll-up",
            Self::ScrollDown { .. } => "scroll-down",
            Self::MediaPlayPause => "media-play-pause",
            Self::MediaNext => "media-next",
            Self::SetVolume(_) => "set-volume",
            Self::SetBrightness(_) => "set-brightness",
            Self::MoveCursor { .. } => "move-cursor",
            Self::Tracking => "tracking",
        }
    }

    /// Human-readable status line.
    pub fn status_text(&self) -> String {
        match self {
            Self::LeftClick => "Left Click".to_string(),
            Self::RightClick => "Right Click".to_string(),
            Self::ScrollUp { .. } => "Scroll Up".to_string(),
            Self::ScrollDown { .. } => "Scroll Down".to_string(),
            Self::MediaPlayPause => "Play/Pause".to_string(),
            Self::MediaNext => "Next Track".to_string(),
            Self::SetVolume(v) => format!("Volume {:.0}%", v * 100.0),
            Self::SetBrightness(b) => format!("Brightness {}%", b),
            Self::MoveCursor { x, y } => format!("Cursor ({}, {})", x, y),
            Self::Tracking => "Tracking".to_string(),
        }
    }

    /// Whether this is the no-op.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Tracking)
    }

    /// Action as an IPC s-expression.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::ScrollUp { amount } | Self::ScrollDown { amount } => {
                format!("(:action :{} :amount {})", self.label(), amount)
            }
            Self::SetVolume(v) => format!("(:action :{} :level {:.3})", self.label(), v),
            Self::SetBrightness(b) => format!("(:action :{} :level {})", self.label(), b),
            Self::MoveCursor { x, y } => format!("(:action :{} :x {} :y {})", self.label(), x, y),
            _ => format!("(:action :{})", self.label()),
        }
    }
}
