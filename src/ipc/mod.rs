//! IPC: length-prefixed s-expressions over a Unix socket.
//!
//! The landmark estimator pushes frames; any authenticated client may
//! query engine state and receives a `gesture-frame` event per
//! processed frame.

pub mod dispatch;
pub mod frame_slot;
pub mod server;

pub use dispatch::escape_string;
pub use frame_slot::{FrameSlot, PendingFrame};
pub use server::IpcServer;
