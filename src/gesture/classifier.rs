//! Gesture classification from hand landmark frames.
//!
//! Combines the geometric predicates into exactly one `Gesture` per
//! frame.  Evaluation order is the priority order: media pointing
//! gestures first, then the click gestures, then the scroll gesture,
//! then pinch.

use tracing::trace;

use super::landmarks::{HandLandmark, LandmarkFrame};
use super::predicates::{
    distance, is_curled, is_extended, pointing_down, CameraOrientation, Finger, FingerStates,
};

// ── Gesture types ──────────────────────────────────────────

/// Recognized gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Index, middle, ring and pinky curled.
    Fist,
    /// Index, middle, ring and pinky extended.
    OpenPalm,
    /// Index and middle extended, ring and pinky curled.
    PeaceSign,
    /// Index extended, others curled.
    PointUp,
    /// Index hanging below its knuckle, others curled.
    PointDown,
    /// Thumb and index tips close together.
    Pinch,
    /// Hand present, nothing recognized.
    None,
}

/// Action family a gesture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureFamily {
    Media,
    Click,
    Scroll,
    Continuous,
}

impl Gesture {
    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fist => "fist",
            Self::OpenPalm => "open-palm",
            Self::PeaceSign => "peace-sign",
            Self::PointUp => "point-up",
            Self::PointDown => "point-down",
            Self::Pinch => "pinch",
            Self::None => "none",
        }
    }

    pub fn family(&self) -> Option<GestureFamily> {
        match self {
            Self::PointUp | Self::PointDown => Some(GestureFamily::Media),
            Self::Fist | Self::OpenPalm => Some(GestureFamily::Click),
            Self::PeaceSign => Some(GestureFamily::Scroll),
            Self::Pinch => Some(GestureFamily::Continuous),
            Self::None => None,
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Classification thresholds.  All distances are normalized frame units.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Thumb-index distance below which the hand is pinching.
    pub pinch_threshold: f32,
    /// Index tip must hang this far below the index knuckle to point down.
    pub pointing_down_threshold: f32,
    /// Mirroring convention of the incoming frames (thumb direction).
    pub orientation: CameraOrientation,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.15,
            pointing_down_threshold: 0.1,
            orientation: CameraOrientation::Mirrored,
        }
    }
}

// ── Classification ─────────────────────────────────────────

/// Result of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub gesture: Gesture,
    pub fingers: FingerStates,
    /// Thumb tip to index tip distance.
    pub pinch_distance: f32,
}

/// Classify a frame.  Always returns exactly one gesture.
pub fn classify(frame: &LandmarkFrame, config: &ClassifierConfig) -> Classification {
    let o = config.orientation;
    let fingers = FingerStates::from_frame(frame, o);
    let pinch_distance = distance(
        frame.point(HandLandmark::ThumbTip),
        frame.point(HandLandmark::IndexTip),
    );

    let extended = |f: Finger| is_extended(frame, f, o);
    let curled = |f: Finger| is_curled(frame, f, o);
    let rest_curled = curled(Finger::Middle) && curled(Finger::Ring) && curled(Finger::Pinky);

    let gesture = if extended(Finger::Index) && rest_curled {
        Gesture::PointUp
    } else if pointing_down(
        frame.point(HandLandmark::IndexTip),
        frame.point(HandLandmark::IndexMcp),
        config.pointing_down_threshold,
    ) && rest_curled
    {
        Gesture::PointDown
    } else if curled(Finger::Index) && rest_curled {
        Gesture::Fist
    } else if extended(Finger::Index)
        && extended(Finger::Middle)
        && extended(Finger::Ring)
        && extended(Finger::Pinky)
    {
        Gesture::OpenPalm
    } else if extended(Finger::Index)
        && extended(Finger::Middle)
        && curled(Finger::Ring)
        && curled(Finger::Pinky)
    {
        Gesture::PeaceSign
    } else if pinch_distance < config.pinch_threshold {
        Gesture::Pinch
    } else {
        Gesture::None
    };

    trace!(gesture = gesture.as_str(), pinch_distance, "classified frame");

    Classification {
        gesture,
        fingers,
        pinch_distance,
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Hand pose builders for tests.  Each finger is placed at its own
/// x column; tips sit 0.1 above (extended) or 0.05 below (curled)
/// their proximal joints at y = 0.5.
#[cfg(test)]
pub(crate) mod poses {
    use super::super::landmarks::{HandLandmark, Handedness, LandmarkFrame, LandmarkPoint};
    use super::super::landmarks::test_points;

    pub(crate) fn points(index: bool, middle: bool, ring: bool, pinky: bool) -> Vec<LandmarkPoint> {
        let mut pts = test_points();
        let mut place = |tip: HandLandmark, pip: HandLandmark, mcp: HandLandmark, x: f32, up: bool| {
            pts[mcp.index()] = LandmarkPoint::new(x, 0.6, 0.0);
            pts[pip.index()] = LandmarkPoint::new(x, 0.5, 0.0);
            let tip_y = if up { 0.4 } else { 0.55 };
            pts[tip.index()] = LandmarkPoint::new(x, tip_y, 0.0);
        };
        place(HandLandmark::IndexTip, HandLandmark::IndexPip, HandLandmark::IndexMcp, 0.40, index);
        place(HandLandmark::MiddleTip, HandLandmark::MiddlePip, HandLandmark::MiddleMcp, 0.45, middle);
        place(HandLandmark::RingTip, HandLandmark::RingPip, HandLandmark::RingMcp, 0.50, ring);
        place(HandLandmark::PinkyTip, HandLandmark::PinkyPip, HandLandmark::PinkyMcp, 0.55, pinky);
        // Thumb well away from the index tip so nothing pinches by accident.
        pts[HandLandmark::ThumbIp.index()] = LandmarkPoint::new(0.20, 0.60, 0.0);
        pts[HandLandmark::ThumbTip.index()] = LandmarkPoint::new(0.15, 0.60, 0.0);
        pts[HandLandmark::Wrist.index()] = LandmarkPoint::new(0.45, 0.80, 0.0);
        pts
    }

    pub(crate) fn frame(points: &[LandmarkPoint]) -> LandmarkFrame {
        LandmarkFrame::from_points(points, Some(Handedness::Right), 0.0).unwrap()
    }

    pub(crate) fn fist() -> Vec<LandmarkPoint> {
        points(false, false, false, false)
    }

    pub(crate) fn open_palm() -> Vec<LandmarkPoint> {
        points(true, true, true, true)
    }

    pub(crate) fn peace() -> Vec<LandmarkPoint> {
        points(true, true, false, false)
    }

    pub(crate) fn point_up() -> Vec<LandmarkPoint> {
        points(true, false, false, false)
    }

    pub(crate) fn point_down() -> Vec<LandmarkPoint> {
        let mut pts = points(false, false, false, false);
        pts[HandLandmark::IndexTip.index()] = LandmarkPoint::new(0.40, 0.75, 0.0);
        pts
    }

    /// Middle/ring/pinky extended, index level with its joint, thumb
    /// touching the index tip: no discrete gesture matches.
    pub(crate) fn pinch() -> Vec<LandmarkPoint> {
        let mut pts = points(false, true, true, true);
        pts[HandLandmark::IndexTip.index()] = LandmarkPoint::new(0.40, 0.5, 0.0);
        pts[HandLandmark::ThumbTip.index()] = LandmarkPoint::new(0.42, 0.5, 0.0);
        pts
    }

    pub(crate) fn set_wrist(pts: &mut [LandmarkPoint], x: f32, y: f32) {
        pts[HandLandmark::Wrist.index()] = LandmarkPoint::new(x, y, 0.0);
    }
}

// ── Tests ──────────────────────────────────────────────────
