use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems; never fatal, the affected value falls back to its default
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Why the target application could not be brought to the foreground
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FocusError {
    #[error("executable path is missing or invalid: {0:?}")]
    InvalidExecutablePath(Option<PathBuf>),
    #[error("failed to launch {path}: {reason}")]
    LaunchFailed { path: PathBuf, reason: String },
    #[error("no window matching '{query}' after {attempts} polls")]
    WindowNotFound { query: String, attempts: u32 },
    #[error("window '{title}' did not take focus after {attempts} attempts")]
    FocusNotObtained { title: String, attempts: u32 },
}

impl FocusError {
    /// Launch failures versus focus timeouts
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            FocusError::InvalidExecutablePath(_) | FocusError::LaunchFailed { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        !self.is_launch_failure()
    }
}

/// A macro step that could not be sent; playback stops there
#[derive(Debug, Error)]
#[error("macro step {step} ({description}) failed: {source}")]
pub struct MacroError {
    pub step: usize,
    pub description: String,
    #[source]
    pub source: DesktopError,
}

/// Failures talking to the OS
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesktopError {
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("unknown key name: {0}")]
    UnknownKey(String),
    #[error("{0}")]
    Os(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,
    #[error("no session is active")]
    NotActive,
    #[error("invalid session length: {0} min")]
    InvalidDuration(u32),
    #[error(transparent)]
    Focus(#[from] FocusError),
    #[error(transparent)]
    Macro(#[from] MacroError),
    #[error("session was ended before the timer started")]
    Superseded,
    #[error("worker task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no files to compress in {0}")]
    NoFiles(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("no sync script found")]
    NoSyncScript,
    #[error("failed to launch sync script {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
