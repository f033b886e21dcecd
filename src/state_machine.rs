//! Session lifecycle: Idle → Starting → Active → Stopping → Idle.
//! There is no paused state; stopping always discards detector history.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// All possible states of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Stopping => write!(f, "Stopping"),
        }
    }
}

impl SessionState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Starting)
                | (SessionState::Starting, SessionState::Active)
                | (SessionState::Starting, SessionState::Idle) // start rolled back
                | (SessionState::Active, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Idle)
        )
    }
}

/// Thread-safe state machine with watch channel for reactive subscribers.
pub struct StateMachine {
    state: RwLock<SessionState>,
    state_tx: watch::Sender<SessionState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            state: RwLock::new(SessionState::Idle),
            state_tx,
        }
    }

    /// Current state (non-blocking read).
    pub fn current(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.current() == SessionState::Active
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", current, next);
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        self.state_tx.send_replace(next);
        info!(from = %current, to = %next, "session_transition");
        Ok(next)
    }

    /// Set the state unconditionally, bypassing transition rules.
    pub fn force(&self, next: SessionState) {
        let mut state = self.state.write();
        let prev = *state;
        *state = next;
        self.state_tx.send_replace(next);
        info!(from = %prev, to = %next, "session_forced");
    }

    /// Force back to Idle from any state (failed start or stop, teardown).
    pub fn force_idle(&self) {
        self.force(SessionState::Idle);
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
