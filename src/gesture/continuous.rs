//! Continuous control mapping: pinch distance to volume, wrist height
//! to brightness.
//!
//! Values are computed for every hand frame so they can be displayed
//! even when nothing is dispatched.

use super::landmarks::LandmarkFrame;

/// Which continuous control a held pinch drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchTarget {
    Volume,
    Brightness,
}

impl PinchTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Brightness => "brightness",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "volume" => Some(Self::Volume),
            "brightness" => Some(Self::Brightness),
            _ => None,
        }
    }
}

/// Continuous mapping configuration.
#[derive(Debug, Clone)]
pub struct ContinuousConfig {
    pub pinch_target: PinchTarget,
    /// Volume = distance * gain, clamped to [0, 1].
    pub volume_gain: f32,
    /// Brightness percent with the hand at the bottom of the frame.
    pub brightness_min: u8,
    /// Brightness percent with the hand at the top of the frame.
    pub brightness_max: u8,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            pinch_target: PinchTarget::Volume,
            volume_gain: 5.0,
            brightness_min: 10,
            brightness_max: 100,
        }
    }
}

/// Map a thumb-index distance to a volume level in [0, 1].
pub fn volume_level(distance: f32, gain: f32) -> f32 {
    (distance * gain).max(0.0).min(1.0)
}

/// Map a normalized wrist y (0 = top) to a brightness percent.
pub fn brightness_level(wrist_y: f32, min: u8, max: u8) -> u8 {
    let y = wrist_y.clamp(0.0, 1.0);
    let (lo, hi) = (min.min(max) as f32, min.max(max) as f32);
    let level = hi - y * (hi - lo);
    level.round().clamp(lo, hi) as u8
}

/// Both continuous values for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousReading {
    pub pinch_distance: f32,
    pub volume: f32,
    pub brightness: u8,
}

impl ContinuousReading {
    pub fn from_frame(frame: &LandmarkFrame, pinch_distance: f32, config: &ContinuousConfig) -> Self {
        Self {
            pinch_distance,
            volume: volume_level(pinch_distance, config.volume_gain),
            brightness: brightness_level(
                frame.wrist().y,
                config.brightness_min,
                config.brightness_max,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_zero_distance() {
        assert_eq!(volume_level(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_volume_at_pinch_threshold() {
        // 0.15 * 5 = 0.75: the pinch trigger never reaches full volume.
        assert!((volume_level(0.15, 5.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_volume_clamp_boundary() {
        assert!((volume_level(0.2, 5.0) - 1.0).abs() < 1e-6);
        assert_eq!(volume_level(0.5, 5.0), 1.0);
        assert_eq!(volume_level(-0.1, 5.0), 0.0);
    }

    #[test]
    fn test_brightness_mapping() {
        assert_eq!(brightness_level(0.0, 10, 100), 100);
        assert_eq!(brightness_level(1.0, 10, 100), 10);
        assert_eq!(brightness_level(0.5, 10, 100), 55);
        assert_eq!(brightness_level(-0.2, 10, 100), 100);
        assert_eq!(brightness_level(1.3, 10, 100), 10);
    }

    #[test]
    fn test_brightness_swapped_range() {
        assert_eq!(brightness_level(0.0, 100, 10), 100);
        assert_eq!(brightness_level(1.0, 100, 10), 10);
    }

    #[test]
    fn test_pinch_target_parse() {
        assert_eq!(PinchTarget::parse("volume"), Some(PinchTarget::Volume));
        assert_eq!(PinchTarget::parse("brightness"), Some(PinchTarget::Brightness));
        assert_eq!(PinchTarget::parse("contrast"), None);
    }
}
