//! Line protocol spoken with the chat executable.
//!
//! Inbound lines are classified into [`OutputEvent`]s by substring
//! matching against configurable [`Markers`]. Outbound lines are plain
//! text, either a slash command or the user's text behind an
//! application tag.

use crate::cli::OutputEvent;
use crate::config::Markers;

/// Classifies raw stdout lines of the chat executable.
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    markers: Markers,
}

impl LineClassifier {
    /// Create a classifier for the given markers.
    #[must_use]
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    /// The markers in use.
    #[must_use]
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Classify one line of output.
    ///
    /// Returns `None` for lines that are empty after trimming. The first
    /// matching rule wins: loading marker, ready marker, then everything
    /// else is a conversation line.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<OutputEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if contains_marker(line, &self.markers.loading) {
            return Some(OutputEvent::Diagnostic);
        }

        if contains_marker(line, &self.markers.ready) {
            return Some(OutputEvent::ReadySignal);
        }

        let message = if self.markers.response_prefix.is_empty() {
            line.to_string()
        } else {
            line.replace(&self.markers.response_prefix, "")
                .trim()
                .to_string()
        };

        Some(OutputEvent::ConversationLine {
            sender: self.markers.bot_sender.clone(),
            message,
        })
    }
}

// An empty marker would match every line.
fn contains_marker(line: &str, marker: &str) -> bool {
    !marker.is_empty() && line.contains(marker)
}

/// Format user input for the child's stdin.
///
/// Returns `None` when there is nothing to send. Slash commands pass
/// through untouched; other text is prefixed with `tag`.
#[must_use]
pub fn format_outbound(text: &str, tag: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else if text.starts_with('/') {
        Some(text.to_string())
    } else {
        Some(format!("{tag}{text}"))
    }
}
