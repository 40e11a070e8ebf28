//! Per-frame gesture engine.
//!
//! One landmark frame in, one `FrameOutcome` out:
//! smooth cursor -> classify -> debounce -> continuous mapping.
//! The engine performs no side effects; the controller hands the
//! outcome's commands to the sink.

use tracing::debug;

use super::action::Action;
use super::classifier::{classify, Classification, ClassifierConfig, Gesture};
use super::continuous::{ContinuousConfig, ContinuousReading, PinchTarget};
use super::cooldown::{CooldownCategory, CooldownConfig, CooldownRegistry};
use super::landmarks::{FrameError, Handedness, LandmarkFrame, LandmarkPoint};
use super::smoothing::{CursorPosition, CursorSmoother, SmoothingConfig};

// ── Input ──────────────────────────────────────────────────

/// Raw estimator output for one video frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameInput {
    /// The estimator found no hand.
    NoHand,
    /// One hand, not yet validated.
    Hand {
        points: Vec<LandmarkPoint>,
        handedness: Option<Handedness>,
    },
}

// ── Config ─────────────────────────────────────────────────

/// Peace-sign scrolling.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Normalized wrist travel from the reference needed for one step.
    pub delta_threshold: f32,
    /// Scroll clicks per step.
    pub amount: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            delta_threshold: 0.05,
            amount: 3,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub cooldown: CooldownConfig,
    pub smoothing: SmoothingConfig,
    pub continuous: ContinuousConfig,
    pub scroll: ScrollConfig,
    /// Tolerance outside [0, 1] before a frame is rejected.
    pub coordinate_margin: f32,
}

// ── Outcome ────────────────────────────────────────────────

/// Hand presence for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HandStatus {
    NoHand,
    Malformed(FrameError),
    Present,
}

/// Everything the engine decided for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp_ms: f64,
    pub hand: HandStatus,
    pub classification: Option<Classification>,
    pub cursor: Option<CursorPosition>,
    /// At most one discrete action; `Tracking` when nothing fired.
    pub discrete: Action,
    /// At most one continuous-control action.
    pub continuous: Option<Action>,
    /// Continuous values, computed whenever a valid hand is present.
    pub reading: Option<ContinuousReading>,
}

impl FrameOutcome {
    fn without_hand(timestamp_ms: f64, hand: HandStatus) -> Self {
        Self {
            timestamp_ms,
            hand,
            classification: None,
            cursor: None,
            discrete: Action::Tracking,
            continuous: None,
            reading: None,
        }
    }

    pub fn gesture(&self) -> Option<Gesture> {
        self.classification.map(|c| c.gesture)
    }

    /// Sink commands in dispatch order: cursor, discrete, continuous.
    pub fn commands(&self) -> Vec<Action> {
        let mut cmds = Vec::with_capacity(3);
        if let Some(pos) = self.cursor {
            cmds.push(Action::MoveCursor { x: pos.x, y: pos.y });
        }
        if !self.discrete.is_noop() {
            cmds.push(self.discrete);
        }
        if let Some(c) = self.continuous {
            cmds.push(c);
        }
        cmds
    }

    /// The action the status line describes, if any.
    pub fn headline_action(&self) -> Option<Action> {
        if !self.discrete.is_noop() {
            Some(self.discrete)
        } else {
            self.continuous
        }
    }

    /// Human-readable status line.
    pub fn status_text(&self) -> String {
        match self.hand {
            HandStatus::NoHand => "No Hand Detected".to_string(),
            HandStatus::Malformed(_) => Action::Tracking.status_text(),
            HandStatus::Present => match self.headline_action() {
                Some(action) => action.status_text(),
                None if self.gesture() == Some(Gesture::PeaceSign) => "Scroll Mode".to_string(),
                None => Action::Tracking.status_text(),
            },
        }
    }
}

// ── Stats ──────────────────────────────────────────────────

/// Running counters.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub frames: u64,
    pub hand_frames: u64,
    pub no_hand_frames: u64,
    pub malformed_frames: u64,
    pub left_clicks: u64,
    pub right_clicks: u64,
    pub scroll_steps: u64,
    pub media_actions: u64,
    pub volume_updates: u64,
    pub brightness_updates: u64,
}

impl EngineStats {
    fn record(&mut self, action: &Action) {
        match action {
            Action::LeftClick => self.left_clicks += 1,
            Action::RightClick => self.right_clicks += 1,
            Action::ScrollUp { .. } | Action::ScrollDown { .. } => self.scroll_steps += 1,
            Action::MediaPlayPause | Action::MediaNext => self.media_actions += 1,
            Action::SetVolume(_) => self.volume_updates += 1,
            Action::SetBrightness(_) => self.brightness_updates += 1,
            Action::MoveCursor { .. } | Action::Tracking => {}
        }
    }
}

// ── Engine ─────────────────────────────────────────────────

/// Gesture engine.  Owns the only cross-frame state: cooldown timers,
/// the cursor smoother and the scroll reference.
pub struct GestureEngine {
    pub classifier: ClassifierConfig,
    pub continuous: ContinuousConfig,
    pub scroll: ScrollConfig,
    pub coordinate_margin: f32,
    pub cooldowns: CooldownRegistry,
    pub smoother: CursorSmoother,
    /// Wrist y where the current peace-sign hold started or last scrolled.
    scroll_reference: Option<f32>,
    /// Previous frame's gesture, for display and change logging.
    last_gesture: Option<Gesture>,
    stats: EngineStats,
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl GestureEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            classifier: config.classifier,
            continuous: config.continuous,
            scroll: config.scroll,
            coordinate_margin: config.coordinate_margin,
            cooldowns: CooldownRegistry::new(config.cooldown),
            smoother: CursorSmoother::new(config.smoothing),
            scroll_reference: None,
            last_gesture: None,
            stats: EngineStats::default(),
        }
    }

    /// Process one frame.  `now_ms` is read once by the caller and used
    /// for every cooldown decision in this frame.
    pub fn process(&mut self, input: &FrameInput, now_ms: f64) -> FrameOutcome {
        self.stats.frames += 1;

        let (points, handedness) = match input {
            FrameInput::NoHand => {
                self.stats.no_hand_frames += 1;
                self.lose_hand();
                return FrameOutcome::without_hand(now_ms, HandStatus::NoHand);
            }
            FrameInput::Hand { points, handedness } => (points, *handedness),
        };

        let frame = match LandmarkFrame::from_points(points, handedness, self.coordinate_margin) {
            Ok(f) => f,
            Err(e) => {
                debug!("rejecting frame: {}", e);
                self.stats.malformed_frames += 1;
                self.lose_hand();
                return FrameOutcome::without_hand(now_ms, HandStatus::Malformed(e));
            }
        };
        self.stats.hand_frames += 1;

        let cursor = self.smoother.update(frame.wrist());
        let classification = classify(&frame, &self.classifier);
        let gesture = classification.gesture;

        if gesture != Gesture::PeaceSign {
            self.scroll_reference = None;
        }
        if self.last_gesture != Some(gesture) {
            debug!(gesture = gesture.as_str(), "gesture changed");
        }
        self.last_gesture = Some(gesture);

        let discrete = self.discrete_action(gesture, frame.wrist().y, now_ms);
        let reading =
            ContinuousReading::from_frame(&frame, classification.pinch_distance, &self.continuous);
        // Engagement follows the pinch distance, not the classified gesture.
        let continuous = if classification.pinch_distance < self.classifier.pinch_threshold {
            self.continuous_action(&reading, now_ms)
        } else {
            None
        };

        for action in std::iter::once(&discrete).chain(continuous.iter()) {
            self.stats.record(action);
        }

        FrameOutcome {
            timestamp_ms: now_ms,
            hand: HandStatus::Present,
            classification: Some(classification),
            cursor: Some(cursor),
            discrete,
            continuous,
            reading: Some(reading),
        }
    }

    fn lose_hand(&mut self) {
        self.scroll_reference = None;
        self.last_gesture = None;
    }

    fn fire(&mut self, category: CooldownCategory, action: Action, now_ms: f64) -> Action {
        if self.cooldowns.try_fire(category, now_ms) {
            debug!(action = action.label(), category = category.as_str(), "action fired");
            action
        } else {
            Action::Tracking
        }
    }

    fn discrete_action(&mut self, gesture: Gesture, wrist_y: f32, now_ms: f64) -> Action {
        match gesture {
            Gesture::PointUp => self.fire(CooldownCategory::Media, Action::MediaPlayPause, now_ms),
            Gesture::PointDown => self.fire(CooldownCategory::Media, Action::MediaNext, now_ms),
            Gesture::Fist => self.fire(CooldownCategory::Click, Action::LeftClick, now_ms),
            Gesture::OpenPalm => self.fire(CooldownCategory::Click, Action::RightClick, now_ms),
            Gesture::PeaceSign => self.scroll_action(wrist_y, now_ms),
            Gesture::Pinch | Gesture::None => Action::Tracking,
        }
    }

    /// The reference is set on entry and only moves when a step fires,
    /// so slow movement accumulates until it crosses the threshold.
    fn scroll_action(&mut self, wrist_y: f32, now_ms: f64) -> Action {
        let Some(reference) = self.scroll_reference else {
            self.scroll_reference = Some(wrist_y);
            return Action::Tracking;
        };

        let dy = wrist_y - reference;
        let amount = self.scroll.amount;
        let step = if dy < -self.scroll.delta_threshold {
            Action::ScrollUp { amount }
        } else if dy > self.scroll.delta_threshold {
            Action::ScrollDown { amount }
        } else {
            return Action::Tracking;
        };

        let action = self.fire(CooldownCategory::Scroll, step, now_ms);
        if !action.is_noop() {
            self.scroll_reference = Some(wrist_y);
        }
        action
    }

    fn continuous_action(&mut self, reading: &ContinuousReading, now_ms: f64) -> Option<Action> {
        let (category, action) = match self.continuous.pinch_target {
            PinchTarget::Volume => (CooldownCategory::Volume, Action::SetVolume(reading.volume)),
            PinchTarget::Brightness => (
                CooldownCategory::Brightness,
                Action::SetBrightness(reading.brightness),
            ),
        };
        let action = self.fire(category, action, now_ms);
        (!action.is_noop()).then_some(action)
    }

    pub fn last_gesture(&self) -> Option<Gesture> {
        self.last_gesture
    }

    pub fn scroll_reference(&self) -> Option<f32> {
        self.scroll_reference
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        let cd = &self.cooldowns.config;
        format!(
            "(:pinch-threshold {:.3} :pointing-down-threshold {:.3} :camera :{} :alpha {:.2} :screen (:width {} :height {}) :pinch-target :{} :volume-gain {:.2} :brightness-min {} :brightness-max {} :scroll-threshold {:.3} :scroll-amount {} :coordinate-margin {:.3} :click-cooldown-ms {:.0} :scroll-cooldown-ms {:.0} :media-cooldown-ms {:.0} :volume-cooldown-ms {:.0} :brightness-cooldown-ms {:.0})",
            self.classifier.pinch_threshold,
            self.classifier.pointing_down_threshold,
            self.classifier.orientation.as_str(),
            self.smoother.config.alpha,
            self.smoother.config.screen_width,
            self.smoother.config.screen_height,
            self.continuous.pinch_target.as_str(),
            self.continuous.volume_gain,
            self.continuous.brightness_min,
            self.continuous.brightness_max,
            self.scroll.delta_threshold,
            self.scroll.amount,
            self.coordinate_margin,
            cd.click_ms,
            cd.scroll_ms,
            cd.media_ms,
            cd.volume_ms,
            cd.brightness_ms,
        )
    }

    /// Generate s-expression for IPC stats.
    pub fn stats_sexp(&self) -> String {
        let s = &self.stats;
        format!(
            "(:frames {} :hand-frames {} :no-hand-frames {} :malformed-frames {} :left-clicks {} :right-clicks {} :scroll-steps {} :media-actions {} :volume-updates {} :brightness-updates {} :suppressed {})",
            s.frames,
            s.hand_frames,
            s.no_hand_frames,
            s.malformed_frames,
            s.left_clicks,
            s.right_clicks,
            s.scroll_steps,
            s.media_actions,
            s.volume_updates,
            s.brightness_updates,
            self.cooldowns.suppressed_count(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
