//! Chat executable spawning and control.
//!
//! This module provides a builder for the chat executable's command line,
//! prerequisite checks run before anything is spawned, and control
//! methods for the running child.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::config::ProcessConfig;

/// Valid range for the `-cmem` option.
pub const CMEM_RANGE: std::ops::RangeInclusive<u8> = 2..=4;

/// Which prerequisite file is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Executable,
    Config,
    Corpus,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executable => f.write_str("Chat executable"),
            Self::Config => f.write_str("Config file"),
            Self::Corpus => f.write_str("Corpus file"),
        }
    }
}

/// Error type for launching the chat executable.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// A prerequisite file does not exist.
    #[error("{kind} not found at {}", path.display())]
    MissingFile { kind: FileKind, path: PathBuf },
    /// An option value the child would reject.
    #[error("Invalid value for {flag}: {reason}")]
    InvalidOption { flag: &'static str, reason: String },
    /// The OS could not create the process.
    #[error("Failed to spawn chat process: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },
    /// A standard stream was not captured.
    #[error("Process {0} not available")]
    MissingPipe(&'static str),
}

/// How a terminate request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The child exited within the timeout.
    Graceful,
    /// The timeout elapsed and the child was killed.
    Killed,
    /// Nothing was running.
    AlreadyTerminated,
}

/// Resolve the chat executable against the resource root.
///
/// Relative paths are joined onto `root`. Outside Windows a trailing
/// `.exe` is dropped so one configuration serves every platform.
#[must_use]
pub fn resolve_executable(root: &Path, executable: &Path) -> PathBuf {
    let executable = if cfg!(windows) {
        executable.to_path_buf()
    } else {
        match executable.to_str().and_then(|s| s.strip_suffix(".exe")) {
            Some(stem) if !stem.is_empty() => PathBuf::from(stem),
            _ => executable.to_path_buf(),
        }
    };

    if executable.is_absolute() {
        executable
    } else {
        root.join(executable)
    }
}

/// Builder for the chat executable's arguments.
#[derive(Debug, Clone)]
pub struct ChatProcessBuilder {
    config: ProcessConfig,
    working_dir: Option<PathBuf>,
}

impl ChatProcessBuilder {
    /// Create a builder with the mandatory config and corpus files.
    #[must_use]
    pub fn new(config_file: impl Into<PathBuf>, corpus_file: impl Into<PathBuf>) -> Self {
        Self::from_config(ProcessConfig::new(config_file, corpus_file))
    }

    /// Create a builder from a full process configuration.
    #[must_use]
    pub fn from_config(config: ProcessConfig) -> Self {
        Self {
            config,
            working_dir: None,
        }
    }

    /// Enable animated printing.
    #[must_use]
    pub fn anim(mut self, enabled: bool) -> Self {
        self.config.anim = enabled;
        self
    }

    /// Set how many conversations the context remains active.
    #[must_use]
    pub fn cmem(mut self, cmem: u8) -> Self {
        self.config.cmem = Some(cmem);
        self
    }

    /// Show the intro message.
    #[must_use]
    pub fn intro(mut self, enabled: bool) -> Self {
        self.config.intro = enabled;
        self
    }

    /// Set the number of answers to return.
    #[must_use]
    pub fn top_answers(mut self, count: u32) -> Self {
        self.config.top_answers = Some(count);
        self
    }

    /// Enable context handling.
    #[must_use]
    pub fn context(mut self, enabled: bool) -> Self {
        self.config.context = enabled;
        self
    }

    /// Enable developer mode.
    #[must_use]
    pub fn dev(mut self, enabled: bool) -> Self {
        self.config.dev = enabled;
        self
    }

    /// Set the working directory for the chat process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Get the process configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let config = &self.config;
        let mut args = vec![
            "-config".to_string(),
            config.config_file.display().to_string(),
            "-c".to_string(),
            config.corpus_file.display().to_string(),
        ];

        if config.anim {
            args.push("-anim".to_string());
        }

        if let Some(cmem) = config.cmem {
            args.push("-cmem".to_string());
            args.push(cmem.to_string());
        }

        if config.intro {
            args.push("-intro".to_string());
        }

        if let Some(top) = config.top_answers {
            args.push("-t".to_string());
            args.push(top.to_string());
        }

        if config.context {
            args.push("-context".to_string());
        }

        if config.dev {
            args.push("-dev".to_string());
        }

        args
    }

    /// Check that the executable and data files exist and options are valid.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::MissingFile` for the first absent file, or
    /// `LaunchError::InvalidOption` for an out-of-range option.
    pub fn check_prerequisites(&self, executable: &Path) -> Result<(), LaunchError> {
        let files = [
            (FileKind::Executable, executable),
            (FileKind::Config, self.config.config_file.as_path()),
            (FileKind::Corpus, self.config.corpus_file.as_path()),
        ];
        for (kind, path) in files {
            if !path.exists() {
                return Err(LaunchError::MissingFile {
                    kind,
                    path: path.to_path_buf(),
                });
            }
        }

        if let Some(cmem) = self.config.cmem {
            if !CMEM_RANGE.contains(&cmem) {
                return Err(LaunchError::InvalidOption {
                    flag: "-cmem",
                    reason: format!(
                        "{cmem} is outside {}..={}",
                        CMEM_RANGE.start(),
                        CMEM_RANGE.end()
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Render a command line for logging.
fn command_line(executable: &Path, args: &[String]) -> String {
    std::iter::once(executable.display().to_string())
        .chain(args.iter().cloned())
        .map(|part| shell_escape::escape(part.into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A running chat executable.
#[derive(Debug)]
pub struct ChatProcess {
    child: Child,
}

impl ChatProcess {
    /// Check prerequisites and spawn the executable with piped stdio.
    ///
    /// Nothing is spawned when a prerequisite check fails. The child is
    /// killed if the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if a check fails or the process fails to spawn.
    pub fn spawn(executable: &Path, builder: &ChatProcessBuilder) -> Result<Self, LaunchError> {
        builder.check_prerequisites(executable)?;

        let args = builder.build_args();
        tracing::info!(
            command = %command_line(executable, &args),
            "Spawning chat process"
        );

        let mut cmd = Command::new(executable);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = builder.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|source| LaunchError::SpawnFailed { source })?;

        tracing::debug!(pid = ?child.id(), "Chat process spawned");
        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(
        &mut self,
        timeout: Duration,
    ) -> std::io::Result<TerminateOutcome> {
        if self.child.try_wait()?.is_some() {
            return Ok(TerminateOutcome::Graceful);
        }

        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await?;
            Ok(TerminateOutcome::Killed)
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(
        &mut self,
        timeout: Duration,
    ) -> std::io::Result<TerminateOutcome> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(TerminateOutcome::Graceful);
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(errno) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, %errno, "SIGTERM delivery failed");
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid, %status, "Chat process exited after SIGTERM");
                Ok(TerminateOutcome::Graceful)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    pid,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Chat process ignored SIGTERM, killing"
                );
                self.child.kill().await?;
                Ok(TerminateOutcome::Killed)
            }
        }
    }
}
