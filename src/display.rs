//! Colored terminal display for chat sessions.
//!
//! [`TerminalObserver`] prints replies, system messages and status
//! changes as timestamped, colored lines, either directly as a
//! [`SessionObserver`] or from events drained off a channel.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::supervisor::{ObserverEvent, SessionObserver, SYSTEM_SENDER};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Format a `sender: message` line without colors.
#[must_use]
pub fn format_message(sender: &str, message: &str) -> String {
    format!("{sender}: {message}")
}

/// Print a message typed by the user.
pub fn print_user_message(message: &str) {
    println!(
        "{} {}",
        timestamp().dimmed(),
        format_message("You", message).bold()
    );
    let _ = io::stdout().flush();
}

/// Print a status line.
pub fn print_status(status: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[STATUS]".blue().bold(),
        status.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Observer printing to the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalObserver {
    /// Also print status changes.
    pub show_status: bool,
}

impl TerminalObserver {
    #[must_use]
    pub fn new(show_status: bool) -> Self {
        Self { show_status }
    }
}

impl TerminalObserver {
    /// Print an event received from a [`ChannelObserver`](crate::supervisor::ChannelObserver).
    pub fn show(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::Display { sender, message } => self.on_display(sender, message),
            ObserverEvent::Status(status) => self.on_status_change(status),
        }
    }
}

impl SessionObserver for TerminalObserver {
    fn on_display(&self, sender: &str, message: &str) {
        let ts = timestamp();
        if sender == SYSTEM_SENDER {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[SYSTEM]".yellow().bold(),
                message.yellow()
            );
        } else {
            println!(
                "{} {} {}",
                ts.dimmed(),
                format!("{sender}:").cyan().bold(),
                message
            );
        }
        let _ = io::stdout().flush();
    }

    fn on_status_change(&self, status: &str) {
        if self.show_status {
            print_status(status);
        }
    }
}
