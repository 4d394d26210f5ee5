//! Tests for the supervisor facade and its observer reporting.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chat_supervisor::cli::{FileKind, LaunchError, TerminateOutcome};
use chat_supervisor::config::DEFAULT_TERMINATE_TIMEOUT;
use chat_supervisor::supervisor::{
    ChatSupervisor, RecordingObserver, SendError, SessionState, SupervisorError,
};

use crate::support::Fixture;

const TIMEOUT: Duration = Duration::from_secs(5);

fn supervisor(fixture: &Fixture) -> (ChatSupervisor, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let supervisor = ChatSupervisor::new(fixture.options(TIMEOUT), observer.clone());
    (supervisor, observer)
}

#[test]
fn default_terminate_timeout_is_five_seconds() {
    assert_eq!(DEFAULT_TERMINATE_TIMEOUT, Duration::from_secs(5));
}

#[test]
fn supervisor_error_display() {
    let err = SupervisorError::from(LaunchError::MissingFile {
        kind: FileKind::Executable,
        path: "/opt/chat".into(),
    });
    assert_eq!(err.to_string(), "Chat executable not found at /opt/chat");
}

#[tokio::test]
async fn send_before_start_reports_not_started() {
    let fixture = Fixture::new();
    let (mut supervisor, observer) = supervisor(&fixture);

    let result = supervisor.send("hello").await;

    assert!(matches!(result, Err(SendError::NotStarted)));
    assert_eq!(
        observer.displays(),
        vec![(
            "System".to_string(),
            "ChatBot process not started.".to_string()
        )]
    );
    assert_eq!(observer.statuses(), vec!["Initializing".to_string()]);
}

#[tokio::test]
async fn start_with_missing_executable_reports_and_keeps_no_session() {
    let fixture = Fixture::new();
    let (mut supervisor, observer) = supervisor(&fixture);

    let result = supervisor
        .start(&fixture.process_config(), Path::new("chat.exe"))
        .await;

    assert!(matches!(
        result,
        Err(SupervisorError::Launch(LaunchError::MissingFile {
            kind: FileKind::Executable,
            ..
        }))
    ));
    assert!(supervisor.session().is_none());
    assert_eq!(supervisor.state(), SessionState::NotStarted);

    let displays = observer.displays();
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].0, "System");
    assert!(displays[0].1.starts_with("Chat executable not found at"));
}

#[tokio::test]
async fn terminate_without_session_is_noop() {
    let fixture = Fixture::new();
    let (mut supervisor, observer) = supervisor(&fixture);

    assert_eq!(
        supervisor.terminate().await.unwrap(),
        TerminateOutcome::AlreadyTerminated
    );
    assert!(observer.events().is_empty());
}

#[cfg(unix)]
mod with_process {
    use super::*;
    use crate::support::{wait_until, CLOSED_STDIN_BOT, ECHO_BOT, LOADING_RECORDER_BOT};

    async fn start(supervisor: &mut ChatSupervisor, fixture: &Fixture, script: &str) {
        for _ in 0..10 {
            match supervisor
                .start(&fixture.process_config(), Path::new(script))
                .await
            {
                Ok(()) => return,
                Err(SupervisorError::Launch(LaunchError::SpawnFailed { source }))
                    if source.raw_os_error() == Some(26) =>
                {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(err) => panic!("start failed: {err}"),
            }
        }
        panic!("start kept failing with ETXTBSY");
    }

    #[tokio::test]
    async fn send_while_loading_reports_still_loading() {
        let fixture = Fixture::new();
        fixture.script("chat", LOADING_RECORDER_BOT);
        let (mut supervisor, observer) = supervisor(&fixture);
        start(&mut supervisor, &fixture, "chat").await;

        let result = supervisor.send("PeriChat: hi").await;

        assert!(matches!(result, Err(SendError::NotReady)));
        assert_eq!(observer.statuses(), vec!["Initializing".to_string()]);
        assert_eq!(
            observer.displays(),
            vec![(
                "System".to_string(),
                "ChatBot is still loading. Please wait...".to_string()
            )]
        );

        supervisor.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_session_survives() {
        let fixture = Fixture::new();
        fixture.script("chat", CLOSED_STDIN_BOT);
        let (mut supervisor, observer) = supervisor(&fixture);
        start(&mut supervisor, &fixture, "chat").await;
        assert!(wait_until(|| supervisor.is_ready(), TIMEOUT).await);

        let result = supervisor.send("PeriChat: hi").await;

        assert!(matches!(result, Err(SendError::Io(_))));
        assert_eq!(supervisor.state(), SessionState::Ready);
        let displays = observer.displays();
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].0, "System");
        assert!(displays[0].1.starts_with("Error sending message: "));

        supervisor.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn full_conversation_and_shutdown() {
        let fixture = Fixture::new();
        fixture.script("chat", ECHO_BOT);
        let (mut supervisor, observer) = supervisor(&fixture);
        start(&mut supervisor, &fixture, "chat").await;

        assert!(wait_until(|| supervisor.is_ready(), TIMEOUT).await);
        supervisor.send("PeriChat: Hello").await.unwrap();
        assert!(wait_until(|| !observer.displays().is_empty(), TIMEOUT).await);

        assert_eq!(
            observer.displays(),
            vec![("ChatBot".to_string(), "echo PeriChat: Hello".to_string())]
        );
        assert_eq!(supervisor.stats().messages_sent, 1);

        assert_eq!(
            supervisor.terminate().await.unwrap(),
            TerminateOutcome::Graceful
        );
        assert_eq!(
            supervisor.terminate().await.unwrap(),
            TerminateOutcome::AlreadyTerminated
        );
        assert_eq!(supervisor.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn restart_replaces_previous_session() {
        let fixture = Fixture::new();
        fixture.script("chat", ECHO_BOT);
        let (mut supervisor, _observer) = supervisor(&fixture);

        start(&mut supervisor, &fixture, "chat").await;
        let first = supervisor.session().map(|s| s.id());
        assert!(wait_until(|| supervisor.is_ready(), TIMEOUT).await);

        start(&mut supervisor, &fixture, "chat").await;
        let second = supervisor.session().map(|s| s.id());

        assert_ne!(first, second);
        assert!(!supervisor.state().is_closed());

        supervisor.terminate().await.unwrap();
    }
}
