//! Gesture pipeline: landmark frames in, actions out.
//!
//! Provides:
//! - `landmarks`: the 21-point hand model and frame validation
//! - `predicates`: finger extension and pointing tests
//! - `classifier`: one `Gesture` per frame, fixed priority
//! - `cooldown`: per-category debounce timers
//! - `smoothing`: cursor EMA in screen space
//! - `continuous`: volume and brightness mapping
//! - `engine`: per-frame orchestration producing a `FrameOutcome`
//! - `frame_timing`: processing-time percentiles

pub mod action;
pub mod classifier;
pub mod continuous;
pub mod cooldown;
pub mod engine;
pub mod frame_timing;
pub mod landmarks;
pub mod predicates;
pub mod smoothing;

pub use action::Action;
pub use classifier::{Gesture, GestureFamily};
pub use engine::{EngineConfig, FrameInput, FrameOutcome, GestureEngine, HandStatus};
pub use landmarks::{Handedness, LandmarkFrame, LandmarkPoint};
