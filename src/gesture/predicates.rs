//! Geometric predicates over a single landmark frame.
//!
//! All functions here are pure: they read a validated `LandmarkFrame`
//! and answer one structural question.  Image coordinates are used
//! throughout, so "above" means a smaller y.

use super::landmarks::{HandLandmark, Handedness, LandmarkFrame, LandmarkPoint};

// ── Fingers ────────────────────────────────────────────────

/// The five fingers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }

    pub fn tip(&self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbTip,
            Self::Index => HandLandmark::IndexTip,
            Self::Middle => HandLandmark::MiddleTip,
            Self::Ring => HandLandmark::RingTip,
            Self::Pinky => HandLandmark::PinkyTip,
        }
    }

    /// The joint one segment proximal to the tip.
    pub fn joint(&self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbIp,
            Self::Index => HandLandmark::IndexPip,
            Self::Middle => HandLandmark::MiddlePip,
            Self::Ring => HandLandmark::RingPip,
            Self::Pinky => HandLandmark::PinkyPip,
        }
    }
}

// ── Camera orientation ─────────────────────────────────────

/// Whether the camera image is mirrored (selfie view) before it reaches
/// the estimator.  Decides which horizontal direction counts as an
/// extended thumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOrientation {
    /// Image flipped horizontally: a right thumb extends toward +x.
    Mirrored,
    /// Raw camera image: a right thumb extends toward -x.
    Direct,
}

impl CameraOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mirrored => "mirrored",
            Self::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mirrored" => Some(Self::Mirrored),
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }

    /// True when an extended thumb points toward +x for this hand.
    /// An unreported hand is treated as a right hand.
    fn thumb_extends_positive(&self, handedness: Option<Handedness>) -> bool {
        let right = handedness != Some(Handedness::Left);
        match self {
            Self::Mirrored => right,
            Self::Direct => !right,
        }
    }
}

// ── Predicates ─────────────────────────────────────────────

/// Euclidean distance in normalized (x, y) image space.
pub fn distance(a: LandmarkPoint, b: LandmarkPoint) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Tip strictly above its proximal joint.
pub fn tip_above(frame: &LandmarkFrame, finger: Finger) -> bool {
    frame.point(finger.tip()).y < frame.point(finger.joint()).y
}

/// Tip strictly below its proximal joint.
pub fn tip_below(frame: &LandmarkFrame, finger: Finger) -> bool {
    frame.point(finger.tip()).y > frame.point(finger.joint()).y
}

/// Thumb extension is horizontal; its sign depends on mirroring and hand.
pub fn thumb_extended(frame: &LandmarkFrame, orientation: CameraOrientation) -> bool {
    let tip = frame.point(HandLandmark::ThumbTip);
    let joint = frame.point(HandLandmark::ThumbIp);
    if orientation.thumb_extends_positive(frame.handedness()) {
        tip.x > joint.x
    } else {
        tip.x < joint.x
    }
}

/// Whether a finger is extended.
pub fn is_extended(frame: &LandmarkFrame, finger: Finger, orientation: CameraOrientation) -> bool {
    match finger {
        Finger::Thumb => thumb_extended(frame, orientation),
        _ => tip_above(frame, finger),
    }
}

/// Whether a finger is curled.  For the four fingers this is "tip below
/// joint", so a tip level with its joint is neither extended nor curled.
pub fn is_curled(frame: &LandmarkFrame, finger: Finger, orientation: CameraOrientation) -> bool {
    match finger {
        Finger::Thumb => !thumb_extended(frame, orientation),
        _ => tip_below(frame, finger),
    }
}

/// Tip hangs more than `threshold` below the knuckle.
pub fn pointing_down(tip: LandmarkPoint, mcp: LandmarkPoint, threshold: f32) -> bool {
    (tip.y - mcp.y) > threshold
}

// ── Finger states ──────────────────────────────────────────

/// Per-finger extended flags for one frame.  Recomputed every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    pub fn from_frame(frame: &LandmarkFrame, orientation: CameraOrientation) -> Self {
        Self {
            thumb: is_extended(frame, Finger::Thumb, orientation),
            index: is_extended(frame, Finger::Index, orientation),
            middle: is_extended(frame, Finger::Middle, orientation),
            ring: is_extended(frame, Finger::Ring, orientation),
            pinky: is_extended(frame, Finger::Pinky, orientation),
        }
    }

    pub fn get(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    pub fn extended_count(&self) -> usize {
        Finger::ALL.iter().filter(|f| self.get(**f)).count()
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub(crate) fn frame_with(
    edits: &[(HandLandmark, f32, f32)],
    handedness: Option<Handedness>,
) -> LandmarkFrame {
    let mut points = super::landmarks::test_points();
    for (lm, x, y) in edits {
        points[lm.index()] = LandmarkPoint::new(*x, *y, 0.0);
    }
    LandmarkFrame::from_points(&points, handedness, 0.0).unwrap()
}

// ── Tests ──────────────────────────────────────────────────
