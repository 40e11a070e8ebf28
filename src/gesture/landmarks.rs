//! Hand landmark data structures.
//!
//! Models the 21-point hand layout produced by the external pose
//! estimator: one wrist point plus four points per finger, all
//! normalized to the camera frame.  A `LandmarkFrame` is only ever
//! built through validation, so downstream code can index it freely.

use std::fmt;

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in estimator order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Fingertip landmarks, thumb first.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Which hand the estimator reported, when it reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse "left" / "right".
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

// ── Points ─────────────────────────────────────────────────

/// One normalized landmark.  x/y are fractions of frame width/height
/// (y grows downward); z is relative depth and ignored by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// ── Errors ─────────────────────────────────────────────────

/// Why a frame was rejected before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The estimator sent the wrong number of points.
    WrongPointCount(usize),
    /// A coordinate was NaN or infinite.
    NonFinite { landmark: usize },
    /// x or y fell outside [0, 1] (plus the configured margin).
    OutOfRange { landmark: usize, x: f32, y: f32 },
}

impl FrameError {
    /// Short keyword for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WrongPointCount(_) => "wrong-point-count",
            Self::NonFinite { .. } => "non-finite",
            Self::OutOfRange { .. } => "out-of-range",
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongPointCount(n) => {
                write!(f, "expected {} landmarks, got {}", LANDMARK_COUNT, n)
            }
            Self::NonFinite { landmark } => {
                write!(f, "landmark {} has a non-finite coordinate", landmark)
            }
            Self::OutOfRange { landmark, x, y } => write!(
                f,
                "landmark {} out of range: ({:.3}, {:.3})",
                landmark, x, y
            ),
        }
    }
}

impl std::error::Error for FrameError {}

// ── Frame ──────────────────────────────────────────────────

/// Validated snapshot of one hand in one video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [LandmarkPoint; LANDMARK_COUNT],
    handedness: Option<Handedness>,
}

impl LandmarkFrame {
    /// Validate raw estimator output.
    ///
    /// `margin` widens the accepted [0, 1] range for x and y; estimators
    /// report points slightly outside the frame when the hand is cut off.
    pub fn from_points(
        points: &[LandmarkPoint],
        handedness: Option<Handedness>,
        margin: f32,
    ) -> Result<Self, FrameError> {
        if points.len() != LANDMARK_COUNT {
            return Err(FrameError::WrongPointCount(points.len()));
        }

        let lo = -margin;
        let hi = 1.0 + margin;
        for (i, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(FrameError::NonFinite { landmark: i });
            }
            if p.x < lo || p.x > hi || p.y < lo || p.y > hi {
                return Err(FrameError::OutOfRange {
                    landmark: i,
                    x: p.x,
                    y: p.y,
                });
            }
        }

        let mut arr = [LandmarkPoint::default(); LANDMARK_COUNT];
        arr.copy_from_slice(points);
        Ok(Self {
            points: arr,
            handedness,
        })
    }

    /// Position of a single landmark.
    pub fn point(&self, landmark: HandLandmark) -> LandmarkPoint {
        self.points[landmark.index()]
    }

    pub fn wrist(&self) -> LandmarkPoint {
        self.point(HandLandmark::Wrist)
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }

    pub fn points(&self) -> &[LandmarkPoint; LANDMARK_COUNT] {
        &self.points
    }
}

/// Create a full set of 21 points at the frame centre for testing.
#[cfg(test)]
pub(crate) fn test_points() -> Vec<LandmarkPoint> {
    vec![LandmarkPoint::new(0.5, 0.5, 0.0); LANDMARK_COUNT]
}

// ── Tests ──────────────────────────────────────────────────
