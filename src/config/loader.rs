//! Locating and reading the supervisor's TOML configuration.
//!
//! An explicit path (from `--config` or `CHAT_SUPERVISOR_CONFIG`) must
//! exist. Without one, `.chat-supervisor.toml` in the current directory
//! and then `<config dir>/chat-supervisor/config.toml` are tried, and the
//! built-in defaults apply when neither is present.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::ChatConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CHAT_SUPERVISOR_CONFIG";

/// Config file looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".chat-supervisor.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Explicit(PathBuf),
    Search(Vec<PathBuf>),
}

/// Finds and parses the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: Source,
}

/// A parsed configuration and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: ChatConfig,
    /// `None` when the defaults were used.
    pub path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Use `CHAT_SUPERVISOR_CONFIG` if set, otherwise search the default
    /// locations.
    #[must_use]
    pub fn discover() -> Self {
        Self::from_env_value(std::env::var_os(CONFIG_ENV_VAR))
    }

    fn from_env_value(value: Option<OsString>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self::explicit(PathBuf::from(path)),
            _ => Self::search(default_candidates()),
        }
    }

    /// Load exactly `path`; a missing file is an error.
    #[must_use]
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Explicit(path.into()),
        }
    }

    /// Try `candidates` in order; defaults apply if none exists.
    #[must_use]
    pub fn search(candidates: Vec<PathBuf>) -> Self {
        Self {
            source: Source::Search(candidates),
        }
    }

    /// Every path this loader may read, in priority order.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        match &self.source {
            Source::Explicit(path) => std::slice::from_ref(path),
            Source::Search(paths) => paths,
        }
    }

    /// The file that [`load`](Self::load) would read.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if an explicit path does not exist.
    pub fn locate(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.source {
            Source::Explicit(path) if path.is_file() => Ok(Some(path.clone())),
            Source::Explicit(path) => Err(ConfigError::NotFound { path: path.clone() }),
            Source::Search(paths) => Ok(paths.iter().find(|p| p.is_file()).cloned()),
        }
    }

    /// Read and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if the chosen
    /// file cannot be read, parsed or validated.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let Some(path) = self.locate()? else {
            tracing::debug!(candidates = ?self.candidates(), "No config file found, using defaults");
            return Ok(LoadedConfig {
                config: ChatConfig::default(),
                path: None,
            });
        };

        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = parse_config(&path, &content)?;
        Ok(LoadedConfig {
            config,
            path: Some(path),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::discover()
    }
}

fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("chat-supervisor").join("config.toml"));
    }
    candidates
}

/// Parse TOML `content` read from `path` and check its values.
///
/// # Errors
///
/// Returns `ConfigError::Parse` for malformed TOML and
/// `ConfigError::Invalid` for values the supervisor cannot run with.
pub fn parse_config(path: &Path, content: &str) -> Result<ChatConfig, ConfigError> {
    let config: ChatConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: &str| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if config.executable.trim().is_empty() {
        return Err(invalid("executable must not be empty"));
    }
    if config.terminate_timeout_secs == 0 {
        return Err(invalid("terminate_timeout_secs must be at least 1"));
    }
    // An empty ready marker never matches, so the session would never accept input.
    if config.markers.ready.trim().is_empty() {
        return Err(invalid("markers.ready must not be empty"));
    }

    Ok(config)
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
