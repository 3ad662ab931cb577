//! Windows input emulation via the SendInput API.
//!
//! Key codes on the wire are already Windows virtual-key codes, so keys pass
//! straight through.  Pointer coordinates are primary-display pixels and are
//! normalized to SendInput's absolute range [0, 65535].
//!
//! SendInput reports how many events it inserted.  Zero means the OS blocked
//! the call, most commonly because the foreground window belongs to a
//! process with a higher integrity level (UIPI).  `GetLastError` tells the
//! two cases apart.

#![cfg(target_os = "windows")]

use remote_core::{ModifierFlags, MouseButton};
use windows::Win32::Foundation::{GetLastError, ERROR_ACCESS_DENIED};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::application::inject_input::{InjectionError, PlatformInputEmulator};

/// VK codes that need `KEYEVENTF_EXTENDEDKEY`.
const EXTENDED_VKS: &[u16] = &[
    0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, // navigation cluster
    0x2D, 0x2E, // Insert, Delete
    0x5B, 0x5C, 0x5D, // Win keys, Apps
    0x6F, // numpad divide
    0x90, // Num Lock
    0xA3, 0xA5, // right Ctrl, right Alt
];

/// Windows implementation of [`PlatformInputEmulator`] using SendInput.
#[derive(Debug, Default)]
pub struct WindowsInputEmulator;

impl WindowsInputEmulator {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformInputEmulator for WindowsInputEmulator {
    fn emit_mouse_move(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        let (dx, dy) = normalize_coords(x, y)?;
        send_mouse(dx, dy, 0, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)
    }

    fn emit_mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        let flags = match (button, pressed) {
            (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
            (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
            (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
            (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
            (MouseButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
            (MouseButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
        };
        send_mouse(0, 0, 0, flags)
    }

    fn emit_mouse_scroll(&self, delta: i32) -> Result<(), InjectionError> {
        // mouseData carries the signed delta reinterpreted as u32.
        send_mouse(0, 0, delta as u32, MOUSEEVENTF_WHEEL)
    }

    fn emit_key_down(&self, vk: u16, _modifiers: ModifierFlags) -> Result<(), InjectionError> {
        send_key(vk, false)
    }

    fn emit_key_up(&self, vk: u16, _modifiers: ModifierFlags) -> Result<(), InjectionError> {
        send_key(vk, true)
    }

    fn emit_unicode_char(&self, ch: char) -> Result<(), InjectionError> {
        let mut units = [0u16; 2];
        let mut inputs = Vec::with_capacity(4);
        for &unit in ch.encode_utf16(&mut units).iter() {
            inputs.push(unicode_input(unit, false));
            inputs.push(unicode_input(unit, true));
        }
        send(&inputs)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn normalize_coords(x: i32, y: i32) -> Result<(i32, i32), InjectionError> {
    // SAFETY: GetSystemMetrics has no preconditions.
    let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    if w <= 0 || h <= 0 {
        return Err(InjectionError::Platform("GetSystemMetrics returned 0".into()));
    }
    Ok((scale_axis(x, w), scale_axis(y, h)))
}

fn scale_axis(v: i32, extent: i32) -> i32 {
    let max = i64::from(extent - 1).max(1);
    (i64::from(v).clamp(0, max) * 65535 / max) as i32
}

fn send_mouse(dx: i32, dy: i32, data: u32, flags: MOUSE_EVENT_FLAGS) -> Result<(), InjectionError> {
    send(&[INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }])
}

fn send_key(vk: u16, key_up: bool) -> Result<(), InjectionError> {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    if EXTENDED_VKS.contains(&vk) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    send(&[keyboard_input(VIRTUAL_KEY(vk), 0, flags)])
}

fn unicode_input(unit: u16, key_up: bool) -> INPUT {
    let mut flags = KEYEVENTF_UNICODE;
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    keyboard_input(VIRTUAL_KEY(0), unit, flags)
}

fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<(), InjectionError> {
    // SAFETY: every element is a fully initialised INPUT and the size
    // argument matches the element type.
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize == inputs.len() {
        return Ok(());
    }
    // SAFETY: reads the calling thread's last-error value.
    let err = unsafe { GetLastError() };
    if err == ERROR_ACCESS_DENIED {
        Err(InjectionError::AccessDenied(
            "SendInput was blocked (UIPI)".into(),
        ))
    } else {
        Err(InjectionError::Platform(format!(
            "SendInput inserted {sent} of {} events (error {})",
            inputs.len(),
            err.0
        )))
    }
}
