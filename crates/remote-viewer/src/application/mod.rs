//! Application layer of the viewer.
//!
//! - **`viewer_session`** – The session state machine: open, frames, canvas,
//!   command transport, close.
//! - **`input_mapper`** – Local input to remote-space commands (throttle,
//!   button pairing, key table).
//! - **`render`** – The `FrameRenderer` seam frames are handed to.

pub mod input_mapper;
pub mod render;
pub mod viewer_session;
