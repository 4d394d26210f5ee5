//! Tests for the chat line protocol.

use chat_supervisor::cli::{format_outbound, LineClassifier, OutputEvent};
use chat_supervisor::config::Markers;

#[test]
fn classify_startup_transcript() {
    let classifier = LineClassifier::default();
    let events: Vec<_> = [
        "Loading model...",
        "Model loaded successfully!",
        "User: PeriChat: Hello",
    ]
    .iter()
    .map(|line| classifier.classify(line))
    .collect();

    assert_eq!(
        events,
        vec![
            Some(OutputEvent::Diagnostic),
            Some(OutputEvent::ReadySignal),
            Some(OutputEvent::ConversationLine {
                sender: "ChatBot".to_string(),
                message: "Hello".to_string(),
            }),
        ]
    );
}

#[test]
fn classify_trims_before_matching() {
    let classifier = LineClassifier::default();
    assert_eq!(
        classifier.classify("\tUser: PeriChat:   spaced out   \r\n"),
        Some(OutputEvent::ConversationLine {
            sender: "ChatBot".to_string(),
            message: "spaced out".to_string(),
        })
    );
}

#[test]
fn classifier_exposes_markers() {
    let markers = Markers {
        ready: "ok".to_string(),
        ..Markers::default()
    };
    let classifier = LineClassifier::new(markers.clone());
    assert_eq!(classifier.markers(), &markers);
    assert_eq!(classifier.classify("ok"), Some(OutputEvent::ReadySignal));
}

#[test]
fn outbound_slash_commands_are_verbatim() {
    for command in ["/exit", "/save", "/geronimo"] {
        assert_eq!(format_outbound(command, "PeriChat: "), Some(command.to_string()));
    }
}

#[test]
fn outbound_text_gets_tag() {
    assert_eq!(
        format_outbound("what is a gob file?", "PeriChat: "),
        Some("PeriChat: what is a gob file?".to_string())
    );
    assert_eq!(format_outbound("hi", ""), Some("hi".to_string()));
    assert_eq!(format_outbound("\n", "PeriChat: "), None);
}
