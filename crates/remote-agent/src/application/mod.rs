//! Application layer of the agent.
//!
//! - **`capture_pipeline`** – Periodic grab/resize/compress loop producing
//!   frames.  OS access goes through the `ScreenGrabber` trait.
//! - **`session_coordinator`** – Owns the one-session slot and wires captured
//!   frames to the transport link.
//! - **`inject_input`** – Turns validated input commands into synthetic OS
//!   input through the `PlatformInputEmulator` trait.
//! - **`dispatch`** – Routes relay messages and peer-channel text to the
//!   components above.

pub mod capture_pipeline;
pub mod dispatch;
pub mod inject_input;
pub mod session_coordinator;
