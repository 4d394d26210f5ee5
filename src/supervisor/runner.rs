//! Supervisor facade used by front ends.
//!
//! [`ChatSupervisor`] holds at most one [`ChatSession`] and turns every
//! failure into observer callbacks, so a GUI or terminal front end only
//! needs `start`, `send` and `terminate`.

use std::path::Path;
use std::sync::Arc;

use crate::cli::{LaunchError, TerminateOutcome};
use crate::config::{ProcessConfig, SessionOptions};
use crate::supervisor::{
    ChatSession, SendError, SessionObserver, SessionState, SessionStats, STATUS_INITIALIZING,
    SYSTEM_SENDER,
};

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// Launching the chat process failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// Failed to terminate the process.
    #[error("Failed to terminate process: {0}")]
    TerminateError(#[from] std::io::Error),
}

/// Drives one chat session on behalf of a front end.
pub struct ChatSupervisor {
    options: SessionOptions,
    observer: Arc<dyn SessionObserver>,
    session: Option<ChatSession>,
}

impl ChatSupervisor {
    #[must_use]
    pub fn new(options: SessionOptions, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            options,
            observer,
            session: None,
        }
    }

    /// The current session, if one was started.
    #[must_use]
    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::NotStarted, ChatSession::state)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.session.as_ref().is_some_and(ChatSession::is_ready)
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.session
            .as_ref()
            .map(ChatSession::stats)
            .unwrap_or_default()
    }

    /// Start a new chat process, terminating any previous one first.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Launch` if the process cannot be
    /// launched; the failure is also shown as a system message.
    pub async fn start(
        &mut self,
        config: &ProcessConfig,
        executable: &Path,
    ) -> Result<(), SupervisorError> {
        if self.session.is_some() {
            self.terminate().await?;
        }

        match ChatSession::start(config, executable, &self.options, Arc::clone(&self.observer)) {
            Ok(session) => {
                tracing::info!(session = %session.id(), pid = ?session.pid(), "Chat session started");
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to start chat process");
                self.observer.on_display(SYSTEM_SENDER, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Send a message to the chat process.
    ///
    /// # Errors
    ///
    /// Returns the `SendError` after reporting it through the observer.
    pub async fn send(&mut self, message: &str) -> Result<(), SendError> {
        let result = match self.session.as_mut() {
            Some(session) => session.send(message).await,
            None => Err(SendError::NotStarted),
        };

        if let Err(err) = &result {
            self.report_send_error(err);
        }
        result
    }

    fn report_send_error(&self, err: &SendError) {
        match err {
            SendError::NotStarted => {
                tracing::warn!("Attempted to send message before starting chat process");
                self.observer
                    .on_display(SYSTEM_SENDER, "ChatBot process not started.");
                self.observer.on_status_change(STATUS_INITIALIZING);
            }
            SendError::NotReady => {
                self.observer.on_status_change(STATUS_INITIALIZING);
                self.observer
                    .on_display(SYSTEM_SENDER, "ChatBot is still loading. Please wait...");
            }
            SendError::Closed => {
                tracing::warn!("Attempted to send message to a closed chat process");
                self.observer
                    .on_display(SYSTEM_SENDER, "ChatBot process is no longer running.");
            }
            SendError::Io(e) => {
                tracing::error!(error = %e, "Error sending message to chat process");
                self.observer
                    .on_display(SYSTEM_SENDER, &format!("Error sending message: {e}"));
            }
        }
    }

    /// Terminate the current session, if any.
    ///
    /// Safe to call repeatedly and from shutdown paths; the wait is
    /// bounded by the configured terminate timeout.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::TerminateError` if the process cannot be
    /// signalled or reaped.
    pub async fn terminate(&mut self) -> Result<TerminateOutcome, SupervisorError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(TerminateOutcome::AlreadyTerminated);
        };

        match session.terminate().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(error = %e, "Error terminating chat process");
                self.observer
                    .on_display(SYSTEM_SENDER, &format!("Error terminating chat process: {e}"));
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for ChatSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSupervisor")
            .field("options", &self.options)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
