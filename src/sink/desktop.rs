//! Desktop sink: pointer and keyboard through `enigo`, volume and
//! brightness through the system control tools.

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tracing::{debug, info};

use super::system_controls::SystemControls;
use super::{ActionSink, Capabilities, SinkError};
use crate::gesture::Action;

pub struct DesktopSink {
    enigo: Enigo,
    controls: SystemControls,
    screen: Option<(u32, u32)>,
}

impl DesktopSink {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("failed to connect input backend: {:?}", e))?;
        let screen = enigo
            .main_display()
            .ok()
            .and_then(|(w, h)| Some((u32::try_from(w).ok()?, u32::try_from(h).ok()?)));
        info!(?screen, "desktop sink ready");

        Ok(Self {
            enigo,
            controls: SystemControls::probe(),
            screen,
        })
    }

    fn backend<E: std::fmt::Debug>(e: E) -> SinkError {
        SinkError::Backend(format!("{:?}", e))
    }

    fn tap(&mut self, key: Key) -> Result<(), SinkError> {
        self.enigo.key(key, Direction::Click).map_err(Self::backend)
    }
}

impl ActionSink for DesktopSink {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pointer: true,
            keys: true,
            volume: self.controls.has_volume(),
            brightness: self.controls.has_brightness(),
        }
    }

    fn execute(&mut self, action: &Action) -> Result<(), SinkError> {
        debug!(action = action.label(), "desktop execute");
        match *action {
            Action::LeftClick => self
                .enigo
                .button(Button::Left, Direction::Click)
                .map_err(Self::backend),
            Action::RightClick => self
                .enigo
                .button(Button::Right, Direction::Click)
                .map_err(Self::backend),
            // Positive scroll is down.
            Action::ScrollUp { amount } => self
                .enigo
                .scroll(-(amount as i32), Axis::Vertical)
                .map_err(Self::backend),
            Action::ScrollDown { amount } => self
                .enigo
                .scroll(amount as i32, Axis::Vertical)
                .map_err(Self::backend),
            Action::MediaPlayPause => self.tap(Key::Space),
            Action::MediaNext => self.tap(Key::RightArrow),
            Action::SetVolume(level) => self.controls.set_volume(level),
            Action::SetBrightness(percent) => self.controls.set_brightness(percent),
            Action::MoveCursor { x, y } => self
                .enigo
                .move_mouse(x, y, Coordinate::Abs)
                .map_err(Self::backend),
            Action::Tracking => Ok(()),
        }
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        self.screen
    }
}
