//! InputInjector: turns validated input commands into synthetic OS input.
//!
//! The injector sits at the application layer and delegates every OS call to
//! a [`PlatformInputEmulator`] trait object.  Platform implementations live
//! in `infrastructure::input_emulation`.
//!
//! # Rules (for beginners)
//!
//! - Commands are only honoured while a session is Active.  The injector
//!   watches the coordinator's active-session channel and rejects anything
//!   that arrives outside a session.
//! - Pointer moves to the position the cursor already has are skipped.
//! - Button presses move the cursor first, but only when it is not already
//!   at the requested position.
//! - Text is typed one character at a time through the virtual-key table.
//!   Characters that need Shift are wrapped in Shift down/up.  Characters
//!   the table does not know are injected directly as Unicode.
//! - An OS failure on one command is reported to the caller and never
//!   poisons the injector; the next command is attempted normally.

use std::sync::Arc;

use remote_core::keymap::virtual_keys::VK_SHIFT;
use remote_core::keymap::{char_to_vk, CharKey};
use remote_core::{InputCommand, ModifierFlags, MouseButton, Session};
use thiserror::Error;
use tokio::sync::watch;

/// Error type for input injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// A command arrived while no session was Active.
    #[error("no active session; input command rejected")]
    NoActiveSession,

    /// The OS refused the synthetic event.
    #[error("synthetic input denied by the OS: {0}")]
    AccessDenied(String),

    /// Any other platform API failure.
    #[error("platform error: {0}")]
    Platform(String),

    /// The key has no mapping on this platform.
    #[error("no platform mapping for virtual key {0:#04x}")]
    UnmappedKey(u16),
}

impl InjectionError {
    /// Operator-facing advice for fixing the failure, if there is any.
    pub fn remediation_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoActiveSession | Self::UnmappedKey(_) => None,
            Self::AccessDenied(_) => Some(if cfg!(target_os = "windows") {
                "Windows blocks synthetic input into windows running at a higher \
                 integrity level (UIPI). Run the agent as a service or elevated, \
                 or control only non-elevated windows."
            } else {
                "The display server refused synthetic input. Run the agent inside \
                 the user's graphical session with access to the display."
            }),
            Self::Platform(_) => Some(if cfg!(target_os = "linux") {
                "Check that DISPLAY points at the active X session and that the \
                 XTEST extension is enabled."
            } else {
                "Check that the agent runs in the interactive user session."
            }),
        }
    }
}

/// Platform-agnostic input emulation trait.
///
/// Each supported OS provides an implementation in the infrastructure layer.
pub trait PlatformInputEmulator: Send + Sync {
    /// Moves the cursor to an absolute position on the primary display.
    fn emit_mouse_move(&self, x: i32, y: i32) -> Result<(), InjectionError>;

    /// Presses or releases a mouse button at the current cursor position.
    fn emit_mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError>;

    /// Scrolls the vertical wheel.  `delta` uses 120 units per notch.
    fn emit_mouse_scroll(&self, delta: i32) -> Result<(), InjectionError>;

    /// Presses a key given as a Windows virtual-key code.
    fn emit_key_down(&self, vk: u16, modifiers: ModifierFlags) -> Result<(), InjectionError>;

    /// Releases a key given as a Windows virtual-key code.
    fn emit_key_up(&self, vk: u16, modifiers: ModifierFlags) -> Result<(), InjectionError>;

    /// Types one character directly, bypassing the keyboard layout.
    fn emit_unicode_char(&self, ch: char) -> Result<(), InjectionError>;
}

/// Filters duplicate consecutive pointer positions.
#[derive(Default)]
struct DedupFilter {
    last_mouse_pos: Option<(i32, i32)>,
}

impl DedupFilter {
    fn should_send_mouse_move(&mut self, x: i32, y: i32) -> bool {
        if self.last_mouse_pos == Some((x, y)) {
            return false;
        }
        self.last_mouse_pos = Some((x, y));
        true
    }

    fn reset(&mut self) {
        self.last_mouse_pos = None;
    }
}

/// The Input Injector.
pub struct InputInjector {
    emulator: Arc<dyn PlatformInputEmulator>,
    dedup: DedupFilter,
    sessions: watch::Receiver<Option<Session>>,
    current_session: Option<String>,
}

impl InputInjector {
    /// Creates an injector that honours commands while `sessions` holds an
    /// Active session.
    pub fn new(
        emulator: Arc<dyn PlatformInputEmulator>,
        sessions: watch::Receiver<Option<Session>>,
    ) -> Self {
        Self {
            emulator,
            dedup: DedupFilter::default(),
            sessions,
            current_session: None,
        }
    }

    /// Injects one command.
    ///
    /// # Errors
    ///
    /// [`InjectionError::NoActiveSession`] when no session is Active; any
    /// platform error from the emulator otherwise.
    pub fn handle(&mut self, command: &InputCommand) -> Result<(), InjectionError> {
        self.require_session()?;
        match command {
            InputCommand::MouseMove { x, y } => self.move_to(*x, *y),
            InputCommand::MouseDown { button, x, y } => self.mouse_button(*button, true, *x, *y),
            InputCommand::MouseUp { button, x, y } => self.mouse_button(*button, false, *x, *y),
            InputCommand::MouseWheel { delta } => self.scroll(*delta),
            InputCommand::KeyDown { key_code, modifiers } => {
                self.emulator.emit_key_down(*key_code, *modifiers)
            }
            InputCommand::KeyUp { key_code, modifiers } => {
                self.emulator.emit_key_up(*key_code, *modifiers)
            }
            InputCommand::Text { text } => self.send_text(text),
        }
    }

    /// Moves the cursor unless it is already at `(x, y)`.
    pub fn move_to(&mut self, x: i32, y: i32) -> Result<(), InjectionError> {
        if self.dedup.should_send_mouse_move(x, y) {
            if let Err(e) = self.emulator.emit_mouse_move(x, y) {
                self.dedup.reset();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Relocates if needed, then presses or releases `button`.
    pub fn mouse_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        x: i32,
        y: i32,
    ) -> Result<(), InjectionError> {
        self.move_to(x, y)?;
        self.emulator.emit_mouse_button(button, pressed)
    }

    pub fn scroll(&mut self, delta: i32) -> Result<(), InjectionError> {
        if delta == 0 {
            return Ok(());
        }
        self.emulator.emit_mouse_scroll(delta)
    }

    /// Types `text` as a sequence of key events.
    ///
    /// Stops at the first platform failure.
    pub fn send_text(&mut self, text: &str) -> Result<(), InjectionError> {
        for ch in text.chars() {
            self.type_char(ch)?;
        }
        Ok(())
    }

    fn type_char(&self, ch: char) -> Result<(), InjectionError> {
        let none = ModifierFlags::default();
        let Some(CharKey { vk, shift }) = char_to_vk(ch) else {
            return self.emulator.emit_unicode_char(ch);
        };

        if shift {
            let held = ModifierFlags(ModifierFlags::SHIFT);
            self.emulator.emit_key_down(VK_SHIFT, none)?;
            let typed = self
                .emulator
                .emit_key_down(vk, held)
                .and_then(|()| self.emulator.emit_key_up(vk, held));
            let released = self.emulator.emit_key_up(VK_SHIFT, none);
            typed.and(released)
        } else {
            self.emulator.emit_key_down(vk, none)?;
            self.emulator.emit_key_up(vk, none)
        }
    }

    /// Forgets the last cursor position.
    pub fn reset(&mut self) {
        self.dedup.reset();
    }

    fn require_session(&mut self) -> Result<(), InjectionError> {
        let active = self.sessions.borrow().as_ref().map(|s| s.session_id.clone());
        if active != self.current_session {
            self.dedup.reset();
            self.current_session = active.clone();
        }
        active.map(|_| ()).ok_or(InjectionError::NoActiveSession)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
