//! Session state machine.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Current state of a chat session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    NotStarted,
    Starting,
    Ready,
    /// Stdout closed without a terminate request.
    Exited,
    /// Reading from the child failed.
    Failed,
    Terminated,
}

impl SessionState {
    /// Returns true once the session can no longer accept messages.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Exited | Self::Failed | Self::Terminated)
    }

    /// Whether moving from `self` to `to` is allowed.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use SessionState::{Exited, Failed, NotStarted, Ready, Starting, Terminated};
        match (self, to) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            _ => matches!(
                (self, to),
                (NotStarted, Starting)
                    | (Starting, Ready | Exited | Failed)
                    | (Ready, Exited | Failed)
            ),
        }
    }
}

/// State machine for tracking session progress.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    lines_received: usize,
    diagnostics_skipped: usize,
    responses: usize,
    messages_sent: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            lines_received: 0,
            diagnostics_skipped: 0,
            responses: 0,
            messages_sent: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `new_state` if the transition is allowed.
    ///
    /// Returns whether the state changed.
    pub fn transition(&mut self, new_state: SessionState) -> bool {
        if self.state == new_state || !self.state.can_transition_to(new_state) {
            tracing::debug!(from = ?self.state, to = ?new_state, "Ignoring state transition");
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
        true
    }

    pub fn record_line(&mut self) {
        self.lines_received = self.lines_received.saturating_add(1);
    }

    pub fn record_diagnostic(&mut self) {
        self.diagnostics_skipped = self.diagnostics_skipped.saturating_add(1);
    }

    pub fn record_response(&mut self) {
        self.responses = self.responses.saturating_add(1);
    }

    pub fn record_sent(&mut self) {
        self.messages_sent = self.messages_sent.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            lines_received: self.lines_received,
            diagnostics_skipped: self.diagnostics_skipped,
            responses: self.responses,
            messages_sent: self.messages_sent,
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines_received: usize,
    pub diagnostics_skipped: usize,
    pub responses: usize,
    pub messages_sent: usize,
}

/// State machine shared between the caller and the output listener.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<SessionStateMachine>,
}

impl SharedState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state machine; a panic elsewhere never wedges the session.
    pub fn lock(&self) -> MutexGuard<'_, SessionStateMachine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Transition to `new_state`; returns whether the state changed.
    pub fn transition(&self, new_state: SessionState) -> bool {
        self.lock().transition(new_state)
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.lock().stats()
    }
}
