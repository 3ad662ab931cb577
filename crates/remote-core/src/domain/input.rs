//! Input commands in remote-screen coordinates.
//!
//! An [`InputCommand`] is what the viewer produces after mapping local
//! pointer/keyboard events and what the agent's injector consumes.  On the
//! wire each command becomes a `uem_remote_action` message; the conversions
//! live here so both ends agree on which `params` each action carries.

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{ActionParams, MouseButton, RemoteAction, RemoteActionMessage};

/// Bitmask of held modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierFlags(pub u8);

impl ModifierFlags {
    pub const CTRL: u8 = 1 << 0;
    pub const SHIFT: u8 = 1 << 1;
    pub const ALT: u8 = 1 << 2;
    pub const META: u8 = 1 << 3;

    pub fn ctrl(&self) -> bool {
        self.0 & Self::CTRL != 0
    }

    pub fn shift(&self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    pub fn alt(&self) -> bool {
        self.0 & Self::ALT != 0
    }

    pub fn meta(&self) -> bool {
        self.0 & Self::META != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// One input command, coordinates already in the remote screen's pixel space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    MouseMove { x: i32, y: i32 },
    MouseDown { button: MouseButton, x: i32, y: i32 },
    MouseUp { button: MouseButton, x: i32, y: i32 },
    /// Wheel delta in WHEEL_DELTA units (120 per notch, negative = down).
    MouseWheel { delta: i32 },
    /// `key_code` is a Windows virtual-key code.
    KeyDown { key_code: u16, modifiers: ModifierFlags },
    KeyUp { key_code: u16, modifiers: ModifierFlags },
    Text { text: String },
}

impl InputCommand {
    /// The wire action this command maps to.
    pub fn action(&self) -> RemoteAction {
        match self {
            Self::MouseMove { .. } => RemoteAction::RemoteMouseMove,
            Self::MouseDown { .. } => RemoteAction::RemoteMouseDown,
            Self::MouseUp { .. } => RemoteAction::RemoteMouseUp,
            Self::MouseWheel { .. } => RemoteAction::RemoteMouseWheel,
            Self::KeyDown { .. } => RemoteAction::RemoteKeyDown,
            Self::KeyUp { .. } => RemoteAction::RemoteKeyUp,
            Self::Text { .. } => RemoteAction::RemoteText,
        }
    }

    /// Returns `true` for pointer-move commands (the only throttled kind).
    pub fn is_pointer_move(&self) -> bool {
        matches!(self, Self::MouseMove { .. })
    }

    /// Builds the `uem_remote_action` payload addressed to `device_id`.
    pub fn to_action_message(&self, device_id: &str, timestamp: u64) -> RemoteActionMessage {
        let params = match self {
            Self::MouseMove { x, y } => ActionParams {
                x: Some(*x),
                y: Some(*y),
                ..ActionParams::default()
            },
            Self::MouseDown { button, x, y } | Self::MouseUp { button, x, y } => ActionParams {
                x: Some(*x),
                y: Some(*y),
                button: Some(*button),
                ..ActionParams::default()
            },
            Self::MouseWheel { delta } => ActionParams {
                delta: Some(*delta),
                ..ActionParams::default()
            },
            Self::KeyDown { key_code, modifiers } | Self::KeyUp { key_code, modifiers } => {
                ActionParams {
                    key_code: Some(*key_code),
                    modifiers: (!modifiers.is_empty()).then_some(modifiers.0),
                    ..ActionParams::default()
                }
            }
            Self::Text { text } => ActionParams {
                text: Some(text.clone()),
                ..ActionParams::default()
            },
        };

        RemoteActionMessage {
            device_id: device_id.to_string(),
            action: self.action(),
            params,
            timestamp,
        }
    }
}

impl TryFrom<&RemoteActionMessage> for InputCommand {
    type Error = ProtocolError;

    /// Validates an inbound action and extracts the command.
    ///
    /// A missing mouse button defaults to `Left`; every other missing
    /// parameter is a [`ProtocolError::MissingParam`].
    fn try_from(msg: &RemoteActionMessage) -> Result<Self, Self::Error> {
        let p = &msg.params;
        let name = action_name(msg.action);
        let need = |v: Option<i32>, param: &'static str| {
            v.ok_or(ProtocolError::MissingParam { action: name, param })
        };
        let modifiers = ModifierFlags(p.modifiers.unwrap_or(0));

        Ok(match msg.action {
            RemoteAction::RemoteMouseMove => Self::MouseMove {
                x: need(p.x, "x")?,
                y: need(p.y, "y")?,
            },
            RemoteAction::RemoteMouseDown => Self::MouseDown {
                button: p.button.unwrap_or(MouseButton::Left),
                x: need(p.x, "x")?,
                y: need(p.y, "y")?,
            },
            RemoteAction::RemoteMouseUp => Self::MouseUp {
                button: p.button.unwrap_or(MouseButton::Left),
                x: need(p.x, "x")?,
                y: need(p.y, "y")?,
            },
            RemoteAction::RemoteMouseWheel => Self::MouseWheel {
                delta: need(p.delta, "delta")?,
            },
            RemoteAction::RemoteKeyDown => Self::KeyDown {
                key_code: p.key_code.ok_or(ProtocolError::MissingParam {
                    action: name,
                    param: "keyCode",
                })?,
                modifiers,
            },
            RemoteAction::RemoteKeyUp => Self::KeyUp {
                key_code: p.key_code.ok_or(ProtocolError::MissingParam {
                    action: name,
                    param: "keyCode",
                })?,
                modifiers,
            },
            RemoteAction::RemoteText => Self::Text {
                text: p.text.clone().ok_or(ProtocolError::MissingParam {
                    action: name,
                    param: "text",
                })?,
            },
        })
    }
}

fn action_name(action: RemoteAction) -> &'static str {
    match action {
        RemoteAction::RemoteMouseMove => "remote_mouse_move",
        RemoteAction::RemoteMouseDown => "remote_mouse_down",
        RemoteAction::RemoteMouseUp => "remote_mouse_up",
        RemoteAction::RemoteMouseWheel => "remote_mouse_wheel",
        RemoteAction::RemoteKeyDown => "remote_key_down",
        RemoteAction::RemoteKeyUp => "remote_key_up",
        RemoteAction::RemoteText => "remote_text",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
