//! Local input → remote [`InputCommand`] translation.
//!
//! # Rules (for beginners)
//!
//! - **Coordinates** go through [`CanvasGeometry::map_to_remote`], so every
//!   command lands inside the remote screen.
//! - **Pointer moves** are rate-limited: at most one per throttle window
//!   (50 ms by default).  Everything else passes straight through.
//! - **Button pairing**: a press remembers the remote point and button.  The
//!   matching release reuses that point, so a click never turns into a tiny
//!   drag because the pointer drifted before release.
//! - **Keys** map through the virtual-key table, falling back to the single
//!   character.  Unknown names are dropped.
//! - **Escape** never reaches the remote machine; it is the operator's local
//!   "get me out" key.
//!
//! `now` is passed in by the caller so throttling is testable without a
//! clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use remote_core::keymap::key_name_to_vk;
use remote_core::keymap::virtual_keys::VK_ESCAPE;
use remote_core::{CanvasGeometry, InputCommand, MouseButton};
use tracing::trace;

use crate::domain::LocalInput;

/// What became of one local input event.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    /// Forward this command to the agent.
    Command(InputCommand),
    /// Pointer move inside the throttle window; dropped.
    Throttled,
    /// The local cancel key was pressed.
    Cancel,
    /// Nothing to send (unknown key, empty text, cancel key release).
    Ignored,
}

#[derive(Debug)]
pub struct InputMapper {
    move_throttle: Duration,
    last_move_sent: Option<Instant>,
    pressed: HashMap<MouseButton, (i32, i32)>,
}

impl InputMapper {
    pub fn new(move_throttle: Duration) -> Self {
        Self {
            move_throttle,
            last_move_sent: None,
            pressed: HashMap::new(),
        }
    }

    pub fn map(&mut self, input: &LocalInput, canvas: &CanvasGeometry, now: Instant) -> Mapped {
        match input {
            LocalInput::PointerMove { x, y } => {
                if let Some(last) = self.last_move_sent {
                    if now.saturating_duration_since(last) < self.move_throttle {
                        return Mapped::Throttled;
                    }
                }
                self.last_move_sent = Some(now);
                let (x, y) = canvas.map_to_remote(*x, *y);
                Mapped::Command(InputCommand::MouseMove { x, y })
            }
            LocalInput::PointerDown { x, y, button } => {
                let (x, y) = canvas.map_to_remote(*x, *y);
                self.pressed.insert(*button, (x, y));
                Mapped::Command(InputCommand::MouseDown {
                    button: *button,
                    x,
                    y,
                })
            }
            LocalInput::PointerUp { x, y, button } => {
                let (x, y) = self
                    .pressed
                    .remove(button)
                    .unwrap_or_else(|| canvas.map_to_remote(*x, *y));
                Mapped::Command(InputCommand::MouseUp {
                    button: *button,
                    x,
                    y,
                })
            }
            LocalInput::Wheel { delta } => Mapped::Command(InputCommand::MouseWheel { delta: *delta }),
            LocalInput::KeyDown { key, modifiers } => match key_name_to_vk(key) {
                Some(VK_ESCAPE) => Mapped::Cancel,
                Some(key_code) => Mapped::Command(InputCommand::KeyDown {
                    key_code,
                    modifiers: *modifiers,
                }),
                None => {
                    trace!(key, "unmapped key dropped");
                    Mapped::Ignored
                }
            },
            LocalInput::KeyUp { key, modifiers } => match key_name_to_vk(key) {
                Some(VK_ESCAPE) | None => Mapped::Ignored,
                Some(key_code) => Mapped::Command(InputCommand::KeyUp {
                    key_code,
                    modifiers: *modifiers,
                }),
            },
            LocalInput::Text(text) if text.is_empty() => Mapped::Ignored,
            LocalInput::Text(text) => Mapped::Command(InputCommand::Text { text: text.clone() }),
        }
    }

    /// Forgets pressed buttons and the throttle window.  Called when a new
    /// session starts.
    pub fn reset(&mut self) {
        self.last_move_sent = None;
        self.pressed.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
