//! Recording input emulator for tests.
//!
//! The native emulators move the real cursor and press real keys, so tests
//! use `MockInputEmulator` instead.  Every call is appended to one ordered
//! log, letting assertions check both what was emitted and in what order.
//!
//! Call [`MockInputEmulator::set_failing`] to make every method return
//! [`InjectionError::AccessDenied`] without recording anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use remote_core::{ModifierFlags, MouseButton};

use crate::application::inject_input::{InjectionError, PlatformInputEmulator};

/// One recorded emulator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmittedInput {
    Move(i32, i32),
    Button(MouseButton, bool),
    Scroll(i32),
    KeyDown(u16, ModifierFlags),
    KeyUp(u16, ModifierFlags),
    Unicode(char),
}

#[derive(Default)]
pub struct MockInputEmulator {
    events: Mutex<Vec<EmittedInput>>,
    failing: AtomicBool,
}

impl MockInputEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, oldest first.
    pub fn events(&self) -> Vec<EmittedInput> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, event: EmittedInput) -> Result<(), InjectionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InjectionError::AccessDenied("mock failure".into()));
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

impl PlatformInputEmulator for MockInputEmulator {
    fn emit_mouse_move(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        self.record(EmittedInput::Move(x, y))
    }

    fn emit_mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        self.record(EmittedInput::Button(button, pressed))
    }

    fn emit_mouse_scroll(&self, delta: i32) -> Result<(), InjectionError> {
        self.record(EmittedInput::Scroll(delta))
    }

    fn emit_key_down(&self, vk: u16, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        self.record(EmittedInput::KeyDown(vk, modifiers))
    }

    fn emit_key_up(&self, vk: u16, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        self.record(EmittedInput::KeyUp(vk, modifiers))
    }

    fn emit_unicode_char(&self, ch: char) -> Result<(), InjectionError> {
        self.record(EmittedInput::Unicode(ch))
    }
}
