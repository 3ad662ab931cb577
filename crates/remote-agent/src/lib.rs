//! remote-agent library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the agent do? (for beginners)
//!
//! The *agent* runs on the managed endpoint whose screen is being viewed.
//! It keeps one connection to the relay for its whole lifetime and, when an
//! operator's viewer registers a session for this device:
//!
//! 1. Queries the real primary-display size and picks a capture target,
//!    downsampling anything larger than 1920×1080.
//! 2. Grabs, resizes and JPEG-compresses the screen ~15 times per second and
//!    sends each frame to the relay tagged with the session id.
//! 3. Receives `uem_remote_action` commands (from the relay or, when one was
//!    negotiated, the peer channel) and injects them as synthetic OS input.
//! 4. Stops capturing when the viewer sends `stop_desktop_session` or the
//!    process shuts down.
//!
//! At most one session is Active at a time.

/// Application layer: capture loop, session lifecycle, input injection and
/// message routing.
pub mod application;

/// Infrastructure layer: OS adapters, encoder, configuration storage.
pub mod infrastructure;
