//! Input events as the viewer's window reports them, before mapping.

use remote_core::{ModifierFlags, MouseButton};

/// One local input event.  Pointer positions are in local (window) units.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalInput {
    PointerMove { x: f64, y: f64 },
    PointerDown { x: f64, y: f64, button: MouseButton },
    PointerUp { x: f64, y: f64, button: MouseButton },
    /// Wheel delta in WHEEL_DELTA units (120 per notch, negative = down).
    Wheel { delta: i32 },
    /// `key` is a key name such as `"Enter"`, `"ArrowLeft"` or `"a"`.
    KeyDown { key: String, modifiers: ModifierFlags },
    KeyUp { key: String, modifiers: ModifierFlags },
    /// Composed text, e.g. from an input method or a paste.
    Text(String),
}
