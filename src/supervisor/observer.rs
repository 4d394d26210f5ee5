//! Callbacks through which a session reports to its front end.

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

/// Sender name used for messages produced by the supervisor itself.
pub const SYSTEM_SENDER: &str = "System";

/// Status reported once the child accepts input.
pub const STATUS_READY: &str = "Ready";

/// Status reported while a message cannot be sent yet.
pub const STATUS_INITIALIZING: &str = "Initializing";

/// Status reported after each conversation line.
pub const STATUS_RESPONDED: &str = "Responded";

/// Status reported when the child closes its stdout.
pub const STATUS_EXITED: &str = "Exited";

/// Receiver of display and status updates.
///
/// Implementations are called from the output listener's task as well as
/// from the caller's context, so they must be cheap and must not block.
pub trait SessionObserver: Send + Sync {
    /// Show a message from `sender`.
    fn on_display(&self, sender: &str, message: &str);

    /// Report a status change.
    fn on_status_change(&self, status: &str);
}

/// One observer callback, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Display { sender: String, message: String },
    Status(String),
}

/// Observer that forwards every callback into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<ObserverEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: UnboundedSender<ObserverEvent>) -> Self {
        Self { tx }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_display(&self, sender: &str, message: &str) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(ObserverEvent::Display {
            sender: sender.to_string(),
            message: message.to_string(),
        });
    }

    fn on_status_change(&self, status: &str) {
        let _ = self.tx.send(ObserverEvent::Status(status.to_string()));
    }
}

/// Observer that records every callback in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ObserverEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }

    /// All recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Recorded display callbacks as `(sender, message)` pairs.
    #[must_use]
    pub fn displays(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObserverEvent::Display { sender, message } => Some((sender, message)),
                ObserverEvent::Status(_) => None,
            })
            .collect()
    }

    /// Recorded status callbacks.
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObserverEvent::Status(status) => Some(status),
                ObserverEvent::Display { .. } => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_display(&self, sender: &str, message: &str) {
        self.push(ObserverEvent::Display {
            sender: sender.to_string(),
            message: message.to_string(),
        });
    }

    fn on_status_change(&self, status: &str) {
        self.push(ObserverEvent::Status(status.to_string()));
    }
}
