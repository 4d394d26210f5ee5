//! Shared fixtures: scratch directories and mock chat executables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chat_supervisor::cli::LaunchError;
use chat_supervisor::config::{Markers, ProcessConfig, SessionOptions};
use chat_supervisor::supervisor::{ChatSession, SessionObserver};
use tempfile::TempDir;

/// Loads, announces readiness, then answers every input line.
pub const ECHO_BOT: &str = r#"echo "Loading model..."
echo "Model loaded successfully!"
while IFS= read -r line; do
  echo "User: PeriChat: echo $line"
done
"#;

/// Like `ECHO_BOT` but takes a while to load.
pub const SLOW_BOT: &str = r#"echo "Loading model..."
sleep 1
echo "Model loaded successfully!"
while IFS= read -r line; do
  echo "User: PeriChat: echo $line"
done
"#;

/// Announces readiness, then records its stdin verbatim.
pub const RECORDER_BOT: &str = r#"echo "Model loaded successfully!"
exec cat > "$(dirname "$0")/received.txt"
"#;

/// Never becomes ready and records its stdin verbatim.
pub const LOADING_RECORDER_BOT: &str = r#"echo "Loading model..."
exec cat > "$(dirname "$0")/received.txt"
"#;

/// Ignores SIGTERM and never exits on its own.
pub const STUBBORN_BOT: &str = r#"trap '' TERM
echo "Model loaded successfully!"
while :; do sleep 1; done
"#;

/// Answers SIGTERM with one last reply before exiting.
pub const FAREWELL_BOT: &str = r#"trap 'echo "User: PeriChat: goodbye after terminate"; exit 0' TERM
echo "Model loaded successfully!"
while :; do sleep 1; done
"#;

/// Closes its stdin, then announces readiness.
pub const CLOSED_STDIN_BOT: &str = r#"exec 0<&-
echo "Model loaded successfully!"
while :; do sleep 1; done
"#;

/// Reports its working directory once ready.
pub const PWD_BOT: &str = r#"echo "Model loaded successfully!"
echo "User: PeriChat: $(pwd -P)"
while IFS= read -r line; do :; done
"#;

/// A scratch resource root holding the chatbot's data files.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config_local.yaml"), "greetings_file: g.yml\n").unwrap();
        std::fs::write(dir.path().join("corpus.gob"), b"corpus").unwrap();
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Process config pointing at the fixture's data files.
    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig::new(self.path("config_local.yaml"), self.path("corpus.gob"))
    }

    /// Session options rooted at the fixture with a short terminate timeout.
    pub fn options(&self, terminate_timeout: Duration) -> SessionOptions {
        SessionOptions {
            resource_root: self.dir.path().to_path_buf(),
            markers: Markers::default(),
            terminate_timeout,
        }
    }

    /// Write an executable shell script into the fixture.
    #[cfg(unix)]
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn received(&self) -> String {
        std::fs::read_to_string(self.path("received.txt")).unwrap()
    }
}

fn is_text_file_busy(err: &LaunchError) -> bool {
    // ETXTBSY: another test thread forked while the script was open for writing.
    matches!(err, LaunchError::SpawnFailed { source } if source.raw_os_error() == Some(26))
}

/// Start a session for `script`, a path relative to the fixture.
///
/// Retries spawns that race with script creation.
pub async fn start_session(
    fixture: &Fixture,
    script: &str,
    terminate_timeout: Duration,
    observer: Arc<dyn SessionObserver>,
) -> ChatSession {
    let config = fixture.process_config();
    let options = fixture.options(terminate_timeout);
    let mut attempts = 0;
    loop {
        match ChatSession::start(&config, Path::new(script), &options, Arc::clone(&observer)) {
            Ok(session) => return session,
            Err(err) if is_text_file_busy(&err) && attempts < 10 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(err) => panic!("failed to start session: {err}"),
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
