//! A single supervised chat process.
//!
//! A [`ChatSession`] owns the child process and its stdin. The output
//! listener runs on its own task and shares only the state machine with
//! the session. Messages are written only once the listener has seen the
//! ready marker; anything sent earlier is rejected and dropped.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cli::{
    resolve_executable, ChatProcess, ChatProcessBuilder, LaunchError, LineClassifier,
    TerminateOutcome,
};
use crate::config::{ProcessConfig, SessionOptions};
use crate::supervisor::{
    drain_stderr, ListenerExit, OutputListener, SessionObserver, SessionState, SessionStats,
    SharedState,
};

/// Error type for sending a message to the child.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    /// No session has been started.
    #[error("Chat process not started")]
    NotStarted,
    /// The child has not announced readiness yet.
    #[error("Chat process is still loading")]
    NotReady,
    /// The child exited, failed or was terminated.
    #[error("Chat process is no longer running")]
    Closed,
    /// Writing to the child's stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One running (or finished) chat process.
pub struct ChatSession {
    id: Uuid,
    executable: PathBuf,
    process: Option<ChatProcess>,
    stdin: Option<ChildStdin>,
    shared: Arc<SharedState>,
    listener: Option<JoinHandle<ListenerExit>>,
    terminate_timeout: Duration,
}

impl ChatSession {
    /// Launch the chat executable and start listening to its output.
    ///
    /// `executable` and relative paths in `config` are resolved against
    /// the resource root in `options`, which is also the child's working
    /// directory. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if a prerequisite is missing or the process
    /// cannot be spawned. No process is left running in that case.
    pub fn start(
        config: &ProcessConfig,
        executable: &Path,
        options: &SessionOptions,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, LaunchError> {
        let id = Uuid::new_v4();
        let root = absolute_root(&options.resource_root);
        let executable = resolve_executable(&root, executable);
        let builder =
            ChatProcessBuilder::from_config(config.resolved_against(&root)).working_dir(&root);

        tracing::info!(session = %id, executable = %executable.display(), "Starting chat process");

        let mut process = ChatProcess::spawn(&executable, &builder)?;
        let stdin = process.take_stdin().ok_or(LaunchError::MissingPipe("stdin"))?;
        let stdout = process
            .take_stdout()
            .ok_or(LaunchError::MissingPipe("stdout"))?;
        if let Some(stderr) = process.take_stderr() {
            drain_stderr(stderr, id);
        }

        let shared = Arc::new(SharedState::new());
        shared.transition(SessionState::Starting);

        let listener = OutputListener::new(
            stdout,
            id,
            LineClassifier::new(options.markers.clone()),
            Arc::clone(&shared),
            observer,
        )
        .spawn();

        Ok(Self {
            id,
            executable,
            process: Some(process),
            stdin: Some(stdin),
            shared,
            listener: Some(listener),
            terminate_timeout: options.terminate_timeout,
        })
    }

    /// Session identifier used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resolved path of the executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Child process ID, while it is running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ChatProcess::id)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the child has announced readiness and is still running.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    /// Whether the output listener is still attached and running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Write `message` and a newline to the child's stdin and flush.
    ///
    /// Messages sent before the child is ready are dropped, not queued.
    /// A failed write leaves the session alive.
    ///
    /// # Errors
    ///
    /// Returns `SendError::NotReady` before readiness, `SendError::Closed`
    /// once the session has ended, and `SendError::Io` on write failure.
    pub async fn send(&mut self, message: &str) -> Result<(), SendError> {
        match self.shared.state() {
            SessionState::Ready => {}
            SessionState::NotStarted | SessionState::Starting => {
                tracing::warn!(session = %self.id, "Attempted to send message before ChatBot was ready");
                return Err(SendError::NotReady);
            }
            SessionState::Exited | SessionState::Failed | SessionState::Terminated => {
                return Err(SendError::Closed);
            }
        }

        let stdin = self.stdin.as_mut().ok_or(SendError::Closed)?;
        let mut line = String::with_capacity(message.len() + 1);
        line.push_str(message);
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        self.shared.lock().record_sent();
        tracing::info!(session = %self.id, message, "Sent to chat process");
        Ok(())
    }

    /// Close the child's stdin so it sees end of input.
    pub fn close_input(&mut self) {
        if self.stdin.take().is_some() {
            tracing::debug!(session = %self.id, "Closed chat process stdin");
        }
    }

    /// Wait for the child to exit on its own.
    ///
    /// Returns `None` if the session was already terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.process.as_mut() {
            Some(process) => process.wait().await.map(Some),
            None => Ok(None),
        }
    }

    /// Stop the child: SIGTERM, then SIGKILL once the timeout elapses.
    ///
    /// Calling this again after it succeeded is a no-op. The output
    /// listener is left to finish on its own once the stream closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be signalled or reaped.
    pub async fn terminate(&mut self) -> std::io::Result<TerminateOutcome> {
        let Some(mut process) = self.process.take() else {
            return Ok(TerminateOutcome::AlreadyTerminated);
        };

        self.shared.transition(SessionState::Terminated);
        self.stdin = None;
        self.listener = None;

        let pid = process.id();
        let outcome = process.graceful_terminate(self.terminate_timeout).await?;
        tracing::info!(session = %self.id, ?pid, ?outcome, "Chat process terminated");
        Ok(outcome)
    }
}

/// Anchor a relative resource root at the current directory, since the
/// child is spawned inside it.
fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| root.to_path_buf(), |cwd| cwd.join(root))
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("executable", &self.executable)
            .field("pid", &self.pid())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
