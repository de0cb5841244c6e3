use core::fmt;
use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use foreman_deps::serde_json::Error as SerdeJsonError;
use foreman_deps::toml::de::Error as TomlDeError;
use foreman_deps::toml::ser::Error as TomlSerError;
use thiserror::Error;

use crate::task::{TaskId, TaskStatus};

/// Result type for coordinator and monitor operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while coordinating tasks.
#[derive(Debug, Error)]
pub enum Error {
    /// No task with the given id exists.
    #[error("Task {0} not found")]
    NotFound(TaskId),

    /// The task is not in the status the operation requires.
    #[error("Task {task_id} is {actual}, expected {expected}")]
    InvalidState {
        /// Task the operation targeted
        task_id: TaskId,
        /// Status the operation requires
        expected: TaskStatus,
        /// Status the task actually has
        actual: TaskStatus,
    },

    /// A claim was attempted while the ledger is at the concurrency cap.
    #[error("At maximum concurrency ({limit} active assignments)")]
    ConcurrencyExceeded {
        /// Configured concurrency cap
        limit: usize,
    },

    /// The workspace isolation provider failed to create, merge or remove a workspace.
    #[error("Workspace isolation failed: {0}")]
    IsolationFailure(String),

    /// A stored record could not be understood.
    #[error("Corrupt record in {path:?} at line {line}: {reason}")]
    PersistenceCorruption {
        /// File holding the record
        path: PathBuf,
        /// One-based line number of the record
        line: usize,
        /// Why the record was rejected
        reason: String,
    },

    /// A files-in-scope pattern is not a valid glob.
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    /// A caller-supplied value cannot be stored as given.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] TomlDeError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] TomlSerError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

/// Stable category of an [`Error`], used for logging and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown task id
    NotFound,
    /// Task in the wrong status
    InvalidState,
    /// Concurrency cap reached
    ConcurrencyExceeded,
    /// Isolation provider failure
    IsolationFailure,
    /// Malformed stored record
    PersistenceCorruption,
    /// Bad configuration or input
    Config,
    /// Filesystem or serialization failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::ConcurrencyExceeded => "concurrency_exceeded",
            Self::IsolationFailure => "isolation_failure",
            Self::PersistenceCorruption => "persistence_corruption",
            Self::Config => "config",
            Self::Io => "io",
        };
        formatter.write_str(name)
    }
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::ConcurrencyExceeded { .. } => ErrorKind::ConcurrencyExceeded,
            Self::IsolationFailure(_) => ErrorKind::IsolationFailure,
            Self::PersistenceCorruption { .. } => ErrorKind::PersistenceCorruption,
            Self::InvalidPattern(_)
            | Self::InvalidInput(_)
            | Self::Config(_)
            | Self::TomlDe(_)
            | Self::TomlSer(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Io,
        }
    }

    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for provider and filesystem failures; precondition failures
    /// will keep failing until the state changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IsolationFailure(_) | Self::Io(_))
    }
}
