//! Output listener for the chat executable.
//!
//! The listener owns the child's stdout for the lifetime of the process.
//! It classifies each line, flips the shared state to `Ready` on the
//! ready marker, and forwards conversation lines to the observer. It
//! stops when the stream closes or a read fails.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cli::{LineClassifier, OutputEvent};
use crate::supervisor::{
    SessionObserver, SessionState, SharedState, STATUS_EXITED, STATUS_READY, STATUS_RESPONDED,
    SYSTEM_SENDER,
};

/// Why the listener stopped.
#[derive(Debug)]
pub enum ListenerExit {
    /// The child closed its stdout.
    Eof,
    /// Reading failed; the session is marked failed.
    ReadError(std::io::Error),
}

/// Reads and classifies the child's stdout.
pub struct OutputListener<R> {
    reader: R,
    handler: LineHandler,
}

struct LineHandler {
    session_id: Uuid,
    classifier: LineClassifier,
    shared: Arc<SharedState>,
    observer: Arc<dyn SessionObserver>,
}

impl<R> OutputListener<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    #[must_use]
    pub fn new(
        reader: R,
        session_id: Uuid,
        classifier: LineClassifier,
        shared: Arc<SharedState>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            reader,
            handler: LineHandler {
                session_id,
                classifier,
                shared,
                observer,
            },
        }
    }

    /// Run the listener on its own task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<ListenerExit> {
        tokio::spawn(self.run())
    }

    /// Read until the stream closes or a read fails.
    pub async fn run(self) -> ListenerExit {
        let Self { reader, handler } = self;
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => handler.handle_line(&line),
                Ok(None) => {
                    handler.on_eof();
                    return ListenerExit::Eof;
                }
                Err(e) => {
                    handler.on_read_error(&e);
                    return ListenerExit::ReadError(e);
                }
            }
        }
    }
}

impl LineHandler {
    fn handle_line(&self, line: &str) {
        let Some(event) = self.classifier.classify(line) else {
            return;
        };

        let mut machine = self.shared.lock();
        if machine.state() == SessionState::Terminated {
            drop(machine);
            tracing::debug!(session = %self.session_id, line, "Ignoring output after terminate");
            return;
        }
        machine.record_line();

        match event {
            OutputEvent::Diagnostic => {
                machine.record_diagnostic();
                tracing::trace!(session = %self.session_id, line, "Skipping diagnostic line");
            }
            OutputEvent::ReadySignal => {
                let became_ready = machine.transition(SessionState::Ready);
                drop(machine);
                if became_ready {
                    tracing::info!(session = %self.session_id, "ChatBot is ready");
                    self.observer.on_status_change(STATUS_READY);
                }
            }
            OutputEvent::ConversationLine { sender, message } => {
                machine.record_response();
                let ready = machine.state() == SessionState::Ready;
                drop(machine);
                tracing::info!(session = %self.session_id, %sender, %message, "Received from chat process");
                self.observer.on_display(&sender, &message);
                if ready {
                    self.observer.on_status_change(STATUS_RESPONDED);
                }
            }
        }
    }

    fn on_eof(&self) {
        if self.shared.transition(SessionState::Exited) {
            tracing::info!(session = %self.session_id, "Chat process closed its output");
            self.observer.on_status_change(STATUS_EXITED);
        } else {
            tracing::debug!(session = %self.session_id, "Output closed after shutdown");
        }
    }

    fn on_read_error(&self, err: &std::io::Error) {
        if self.shared.transition(SessionState::Failed) {
            tracing::error!(session = %self.session_id, error = %err, "Error reading from chat process");
            self.observer
                .on_display(SYSTEM_SENDER, &format!("Error reading from chat process: {err}"));
        } else {
            tracing::debug!(session = %self.session_id, error = %err, "Read error after shutdown");
        }
    }
}

/// Drain the child's stderr into the log so the child never blocks on it.
pub fn drain_stderr<R>(reader: R, session_id: Uuid)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::debug!(session = %session_id, stderr = %line, "Chat process stderr");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(session = %session_id, error = %e, "Stopped reading stderr");
                    break;
                }
            }
        }
    });
}
