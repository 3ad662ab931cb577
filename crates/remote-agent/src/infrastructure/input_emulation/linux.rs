//! Linux X11 input emulation via the XTest extension.
//!
//! # What is XTest? (for beginners)
//!
//! XTest is an X11 extension that lets a client synthesize keyboard and
//! pointer events as if the hardware had produced them.  The functions used
//! here are:
//!
//! - `XTestFakeMotionEvent(display, screen, x, y, delay)`: absolute pointer move.
//! - `XTestFakeButtonEvent(display, button, is_press, delay)`: button press/release.
//! - `XTestFakeKeyEvent(display, keycode, is_press, delay)`: key press/release.
//!
//! `XTestFakeKeyEvent` takes a server keycode, not a symbol, so a key goes
//! through two lookups:
//!
//! ```text
//! Windows VK ──vk_to_keysym──▶ X11 KeySym ──XKeysymToKeycode──▶ keycode
//! ```
//!
//! X11 has no wheel API.  Each 120-unit notch becomes a press/release of
//! button 4 (up) or 5 (down).

#![cfg(all(target_os = "linux", feature = "x11"))]

use std::os::raw::{c_int, c_uint, c_ulong};
use std::ptr;

use parking_lot::Mutex;
use remote_core::keymap::{char_to_keysym, vk_to_keysym};
use remote_core::{ModifierFlags, MouseButton};
use x11::xlib::{self, Display};
use x11::xtest;

use crate::application::inject_input::{InjectionError, PlatformInputEmulator};

const CURRENT_TIME: c_ulong = 0;
const WHEEL_DELTA: i32 = 120;

/// Owned connection to the X server.
struct DisplayHandle(*mut Display);

// SAFETY: the pointer is only dereferenced by Xlib while the surrounding
// mutex is held, so no two threads use the connection at once.
unsafe impl Send for DisplayHandle {}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        // SAFETY: the pointer came from XOpenDisplay and is closed exactly once.
        unsafe { xlib::XCloseDisplay(self.0) };
    }
}

/// XTest implementation of [`PlatformInputEmulator`].
pub struct LinuxXTestEmulator {
    display: Mutex<DisplayHandle>,
}

impl LinuxXTestEmulator {
    /// Opens the display named by `DISPLAY` and checks for XTest.
    ///
    /// # Errors
    ///
    /// [`InjectionError::Platform`] when the display cannot be opened or the
    /// server lacks the XTEST extension.
    pub fn new() -> Result<Self, InjectionError> {
        // SAFETY: a null name selects the DISPLAY environment variable.
        let dpy = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if dpy.is_null() {
            return Err(InjectionError::Platform("cannot open X display".into()));
        }
        let handle = DisplayHandle(dpy);

        let (mut event_base, mut error_base, mut major, mut minor) = (0, 0, 0, 0);
        // SAFETY: dpy is a live connection; out-params are valid locals.
        let present = unsafe {
            xtest::XTestQueryExtension(
                handle.0,
                &mut event_base,
                &mut error_base,
                &mut major,
                &mut minor,
            )
        };
        if present == 0 {
            return Err(InjectionError::Platform(
                "X server lacks the XTEST extension".into(),
            ));
        }

        Ok(Self {
            display: Mutex::new(handle),
        })
    }

    fn with_display<F>(&self, f: F) -> Result<(), InjectionError>
    where
        F: FnOnce(*mut Display) -> c_int,
    {
        let handle = self.display.lock();
        let ok = f(handle.0);
        // SAFETY: the connection is live while the lock is held.
        unsafe { xlib::XFlush(handle.0) };
        if ok == 0 {
            Err(InjectionError::Platform("XTest request failed".into()))
        } else {
            Ok(())
        }
    }

    fn keycode_for(&self, keysym: u32) -> Option<c_uint> {
        let handle = self.display.lock();
        // SAFETY: live connection, plain value lookup.
        let code = unsafe { xlib::XKeysymToKeycode(handle.0, c_ulong::from(keysym)) };
        (code != 0).then_some(c_uint::from(code))
    }

    fn key(&self, keycode: c_uint, pressed: bool) -> Result<(), InjectionError> {
        self.with_display(|dpy| {
            // SAFETY: dpy is live for the duration of the closure.
            unsafe { xtest::XTestFakeKeyEvent(dpy, keycode, c_int::from(pressed), CURRENT_TIME) }
        })
    }

    fn button(&self, button: c_uint, pressed: bool) -> Result<(), InjectionError> {
        self.with_display(|dpy| {
            // SAFETY: dpy is live for the duration of the closure.
            unsafe { xtest::XTestFakeButtonEvent(dpy, button, c_int::from(pressed), CURRENT_TIME) }
        })
    }

    fn vk_keycode(&self, vk: u16) -> Result<c_uint, InjectionError> {
        vk_to_keysym(vk)
            .and_then(|sym| self.keycode_for(sym))
            .ok_or(InjectionError::UnmappedKey(vk))
    }
}

impl PlatformInputEmulator for LinuxXTestEmulator {
    fn emit_mouse_move(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        self.with_display(|dpy| {
            // SAFETY: dpy is live for the duration of the closure.
            unsafe {
                let screen = xlib::XDefaultScreen(dpy);
                xtest::XTestFakeMotionEvent(dpy, screen, x, y, CURRENT_TIME)
            }
        })
    }

    fn emit_mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        let xbutton = match button {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        };
        self.button(xbutton, pressed)
    }

    fn emit_mouse_scroll(&self, delta: i32) -> Result<(), InjectionError> {
        let xbutton = if delta > 0 { 4 } else { 5 };
        let clicks = (delta.unsigned_abs() / WHEEL_DELTA as u32).max(1);
        for _ in 0..clicks {
            self.button(xbutton, true)?;
            self.button(xbutton, false)?;
        }
        Ok(())
    }

    fn emit_key_down(&self, vk: u16, _modifiers: ModifierFlags) -> Result<(), InjectionError> {
        let code = self.vk_keycode(vk)?;
        self.key(code, true)
    }

    fn emit_key_up(&self, vk: u16, _modifiers: ModifierFlags) -> Result<(), InjectionError> {
        let code = self.vk_keycode(vk)?;
        self.key(code, false)
    }

    fn emit_unicode_char(&self, ch: char) -> Result<(), InjectionError> {
        let code = self.keycode_for(char_to_keysym(ch)).ok_or_else(|| {
            InjectionError::Platform(format!("no keycode for {ch:?} in the current keymap"))
        })?;
        self.key(code, true)?;
        self.key(code, false)
    }
}
