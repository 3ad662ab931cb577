//! remote-viewer library entry point.
//!
//! # What does the viewer do? (for beginners)
//!
//! The *viewer* is the operator's side of a remote-control session.  It
//! opens its own relay connection, asks one agent to start streaming
//! (`register_desktop_session`), shows the frames that come back and sends
//! the operator's mouse and keyboard input to the agent as
//! `uem_remote_action` commands.
//!
//! Pointer positions arrive in local window units.  The viewer maps them
//! through the canvas geometry into the remote screen's real pixels, so a
//! click lands in the right place even when a 4K screen is streamed at
//! 1080p and drawn at half size.

/// Domain layer: configuration and local input events.
pub mod domain;

/// Application layer: session controller, input mapper, renderer seam.
pub mod application;

/// Infrastructure layer: file renderer and operator console.
pub mod infrastructure;
