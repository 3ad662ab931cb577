//! # remote-core
//!
//! Shared library for the remote desktop control subsystem.  It holds the
//! relay wire protocol, the session/frame/input domain types, the viewer-side
//! coordinate math and the virtual-key translation tables.
//!
//! The crate performs no I/O: no sockets, no OS input APIs, no screen access.
//! Both the agent (the managed endpoint being controlled) and the viewer (the
//! operator side) depend on it.
//!
//! # How the pieces fit together (for beginners)
//!
//! An operator watches a managed device's screen and drives its mouse and
//! keyboard.  The two processes never talk directly: every message travels
//! through a central relay service that routes by session id and device id.
//!
//! - **`protocol`** – The JSON messages exchanged through the relay, each
//!   identified by a `"type"` field (`register_desktop_session`,
//!   `desktop_frame`, `uem_remote_action`, ...), plus the text codec.
//!
//! - **`domain`** – Pure business rules: the one-session-per-agent slot, the
//!   capture-target calculation, input commands, the canvas-to-remote
//!   coordinate mapping, auto-fit, and the reconnect backoff policy.
//!
//! - **`keymap`** – Windows virtual-key codes are the canonical key identity on
//!   the wire.  These tables translate key names and characters into VK codes
//!   and VK codes into X11 KeySyms for Linux agents.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::backoff::ReconnectBackoff;
pub use domain::canvas::{fit_scale, AutoFit, CanvasGeometry};
pub use domain::frame::{capture_target, CaptureTarget, Frame};
pub use domain::input::{InputCommand, ModifierFlags};
pub use domain::session::{Session, SessionConflictError, SessionSlot, SessionState};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{MouseButton, RelayMessage};
