//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line options for the chat executable.
///
/// Each field maps onto one flag of the child's command line. The config
/// and corpus files are mandatory; everything else is appended only when
/// set.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Path passed as `-config`.
    pub config_file: PathBuf,
    /// Path passed as `-c`.
    pub corpus_file: PathBuf,
    /// Animated letter-by-letter printing (`-anim`).
    pub anim: bool,
    /// Conversations the context remains active, 2 to 4 (`-cmem`).
    pub cmem: Option<u8>,
    /// Show the intro message (`-intro`).
    pub intro: bool,
    /// Number of answers to return (`-t`).
    #[serde(alias = "t")]
    pub top_answers: Option<u32>,
    /// Context handling (`-context`).
    pub context: bool,
    /// Developer mode (`-dev`).
    pub dev: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("config_local.yaml"),
            corpus_file: PathBuf::from("gob/PMFuncOverView.gob"),
            anim: false,
            cmem: Some(2),
            intro: true,
            top_answers: Some(1),
            context: false,
            dev: false,
        }
    }
}

impl ProcessConfig {
    /// Create a config with the two mandatory files and no optional flags.
    #[must_use]
    pub fn new(config_file: impl Into<PathBuf>, corpus_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            corpus_file: corpus_file.into(),
            anim: false,
            cmem: None,
            intro: false,
            top_answers: None,
            context: false,
            dev: false,
        }
    }

    /// Return a copy with relative file paths joined onto `root`.
    #[must_use]
    pub fn resolved_against(&self, root: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            config_file: resolve(&self.config_file),
            corpus_file: resolve(&self.corpus_file),
            ..self.clone()
        }
    }
}

/// Text markers of the line protocol spoken by the chat executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Substring of startup noise lines.
    pub loading: String,
    /// Substring of the line announcing the model is loaded.
    pub ready: String,
    /// Echoed prompt prefix stripped from responses.
    pub response_prefix: String,
    /// Sender name attached to conversation lines.
    pub bot_sender: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            loading: "Loading model...".to_string(),
            ready: "Model loaded successfully!".to_string(),
            response_prefix: "User: PeriChat: ".to_string(),
            bot_sender: "ChatBot".to_string(),
        }
    }
}

/// Runtime options shared by every session a supervisor starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory relative executable and data paths are resolved against.
    pub resource_root: PathBuf,
    /// Line protocol markers.
    pub markers: Markers,
    /// How long `terminate` waits before killing the child.
    pub terminate_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("."),
            markers: Markers::default(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat executable, relative to the resource root unless absolute.
    pub executable: String,
    /// Resource root; the current directory when unset.
    pub resource_root: Option<PathBuf>,
    /// Seconds to wait for a graceful exit before killing the child.
    pub terminate_timeout_secs: u64,
    /// Tag prepended to user messages that are not slash commands.
    pub message_tag: String,
    /// Child command-line options.
    pub process: ProcessConfig,
    /// Line protocol markers.
    pub markers: Markers,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            executable: "chat.exe".to_string(),
            resource_root: None,
            terminate_timeout_secs: DEFAULT_TERMINATE_TIMEOUT.as_secs(),
            message_tag: "PeriChat: ".to_string(),
            process: ProcessConfig::default(),
            markers: Markers::default(),
        }
    }
}

impl ChatConfig {
    /// Build the runtime session options from this configuration.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            resource_root: self
                .resource_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            markers: self.markers.clone(),
            terminate_timeout: Duration::from_secs(self.terminate_timeout_secs),
        }
    }
}
