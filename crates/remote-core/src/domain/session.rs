//! Remote-control session lifecycle.
//!
//! An agent process hosts at most one Active session at a time.  The
//! [`SessionSlot`] enforces that rule: it is the single owner of the current
//! session and moves it through the lifecycle
//!
//! ```text
//! Idle ──activate──▶ Active ──begin_stop──▶ Stopping ──finish_stop──▶ Idle
//! ```
//!
//! The slot is plain data.  Callers that share it between tasks wrap it in a
//! mutex so that activation and teardown are mutually exclusive.

use thiserror::Error;

/// Lifecycle state of the agent's session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Stopping,
}

/// An accepted remote-control session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
}

/// Returned when a session is requested while another one is not Idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session {active_session_id} is already active")]
pub struct SessionConflictError {
    pub active_session_id: String,
}

/// Holder of the one session an agent may run.
#[derive(Debug, Default)]
pub struct SessionSlot {
    state: SessionState,
    current: Option<Session>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session currently held, in Active or Stopping state.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Returns `true` if `session_id` names the Active session.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.state == SessionState::Active
            && self
                .current
                .as_ref()
                .is_some_and(|s| s.session_id == session_id)
    }

    /// Moves Idle → Active with a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionConflictError`] and leaves the slot untouched when a
    /// session is already Active or still Stopping.
    pub fn activate(&mut self, session: Session) -> Result<&Session, SessionConflictError> {
        if self.state != SessionState::Idle {
            let active_session_id = self
                .current
                .as_ref()
                .map(|s| s.session_id.clone())
                .unwrap_or_default();
            return Err(SessionConflictError { active_session_id });
        }
        self.state = SessionState::Active;
        Ok(self.current.insert(session))
    }

    /// Moves Active → Stopping, returning the session being stopped.
    ///
    /// Returns `None` when there is nothing Active (Idle, or a stop is
    /// already underway), which makes repeated stops no-ops.
    pub fn begin_stop(&mut self) -> Option<Session> {
        if self.state != SessionState::Active {
            return None;
        }
        self.state = SessionState::Stopping;
        self.current.clone()
    }

    /// Completes a stop: the slot returns to Idle.
    pub fn finish_stop(&mut self) {
        self.state = SessionState::Idle;
        self.current = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
