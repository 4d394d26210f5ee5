//! Events derived from the chat executable's stdout.

/// A classified line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Startup noise, never displayed.
    Diagnostic,
    /// The child finished loading and accepts input.
    ReadySignal,
    /// A conversational response.
    ConversationLine {
        /// Who said it.
        sender: String,
        /// The response text with the echoed prompt removed.
        message: String,
    },
}
