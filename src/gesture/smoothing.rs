//! Cursor smoothing.
//!
//! Exponential moving average over the wrist position, scaled to
//! screen pixels.  The state is retained across hand loss so the
//! cursor resumes from where it was instead of jumping.

use super::landmarks::LandmarkPoint;

/// Smoothing configuration.
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    /// Weight of the previous smoothed position (0.0 = no smoothing).
    pub alpha: f64,
    /// Target screen width in pixels.
    pub screen_width: u32,
    /// Target screen height in pixels.
    pub screen_height: u32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

/// Screen-space cursor position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

/// Smoother state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingState {
    /// No hand seen yet.
    Uninitialized,
    /// Smoothed screen position, kept at full precision.
    Tracking { x: f64, y: f64 },
}

/// Stateful cursor smoother.
#[derive(Debug, Clone)]
pub struct CursorSmoother {
    pub config: SmoothingConfig,
    state: SmoothingState,
}

impl CursorSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            config,
            state: SmoothingState::Uninitialized,
        }
    }

    pub fn state(&self) -> SmoothingState {
        self.state
    }

    /// Feed one wrist position and return the smoothed cursor.
    pub fn update(&mut self, wrist: LandmarkPoint) -> CursorPosition {
        let raw_x = wrist.x.clamp(0.0, 1.0) as f64 * self.config.screen_width as f64;
        let raw_y = wrist.y.clamp(0.0, 1.0) as f64 * self.config.screen_height as f64;
        let alpha = self.config.alpha;

        self.state = match self.state {
            SmoothingState::Uninitialized => SmoothingState::Tracking { x: raw_x, y: raw_y },
            SmoothingState::Tracking { x, y } => SmoothingState::Tracking {
                x: alpha * x + (1.0 - alpha) * raw_x,
                y: alpha * y + (1.0 - alpha) * raw_y,
            },
        };

        // Always Tracking after the assignment above.
        self.position().unwrap_or(CursorPosition { x: 0, y: 0 })
    }

    /// Current smoothed position, clamped to the screen.
    pub fn position(&self) -> Option<CursorPosition> {
        match self.state {
            SmoothingState::Uninitialized => None,
            SmoothingState::Tracking { x, y } => {
                let max_x = self.config.screen_width.saturating_sub(1) as f64;
                let max_y = self.config.screen_height.saturating_sub(1) as f64;
                Some(CursorPosition {
                    x: x.round().clamp(0.0, max_x) as i32,
                    y: y.round().clamp(0.0, max_y) as i32,
                })
            }
        }
    }

    /// Change the target screen, rescaling the smoothed position.
    pub fn set_screen(&mut self, width: u32, height: u32) {
        if let SmoothingState::Tracking { x, y } = self.state {
            let sx = width as f64 / self.config.screen_width.max(1) as f64;
            let sy = height as f64 / self.config.screen_height.max(1) as f64;
            self.state = SmoothingState::Tracking { x: x * sx, y: y * sy };
        }
        self.config.screen_width = width;
        self.config.screen_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrist(x: f32, y: f32) -> LandmarkPoint {
        LandmarkPoint::new(x, y, 0.0)
    }

    #[test]
    fn test_first_frame_initializes_to_raw() {
        let mut s = CursorSmoother::new(SmoothingConfig::default());
        assert_eq!(s.position(), None);
        let pos = s.update(wrist(0.5, 0.25));
        assert_eq!(pos, CursorPosition { x: 960, y: 270 });
    }

    #[test]
    fn test_ema_step() {
        let mut s = CursorSmoother::new(SmoothingConfig::default());
        s.update(wrist(0.0, 0.0));
        let pos = s.update(wrist(1.0, 1.0));
        // 0.7 * 0 + 0.3 * 1920 = 576, 0.3 * 1080 = 324
        assert_eq!(pos, CursorPosition { x: 576, y: 324 });
    }

    #[test]
    fn test_convergence() {
        let mut s = CursorSmoother::new(SmoothingConfig::default());
        s.update(wrist(0.1, 0.1));
        let mut pos = CursorPosition { x: 0, y: 0 };
        for _ in 0..60 {
            pos = s.update(wrist(0.75, 0.5));
        }
        assert!((pos.x - 1440).abs() <= 1, "x did not converge: {}", pos.x);
        assert!((pos.y - 540).abs() <= 1, "y did not converge: {}", pos.y);
        if let SmoothingState::Tracking { x, y } = s.state() {
            assert!((x - 1440.0).abs() < 1e-3);
            assert!((y - 540.0).abs() < 1e-3);
        } else {
            panic!("smoother should be tracking");
        }
    }

    #[test]
    fn test_alpha_zero_follows_raw() {
        let mut s = CursorSmoother::new(SmoothingConfig {
            alpha: 0.0,
            ..Default::default()
        });
        s.update(wrist(0.1, 0.1));
        let pos = s.update(wrist(0.5, 0.5));
        assert_eq!(pos, CursorPosition { x: 960, y: 540 });
    }

    #[test]
    fn test_clamped_to_screen() {
        let mut s = CursorSmoother::new(SmoothingConfig::default());
        let pos = s.update(wrist(1.0, 1.0));
        assert_eq!(pos, CursorPosition { x: 1919, y: 1079 });
    }

    #[test]
    fn test_set_screen_rescales() {
        let mut s = CursorSmoother::new(SmoothingConfig::default());
        s.update(wrist(0.5, 0.5));
        s.set_screen(3840, 2160);
        assert_eq!(s.position(), Some(CursorPosition { x: 1920, y: 1080 }));
    }
}
