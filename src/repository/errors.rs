//! Repository error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::replicator::ReplicatorError;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Why a meta record could not be used.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("meta file is not readable: {0}")]
    Unreadable(#[from] io::Error),

    #[error("meta record does not end with a newline")]
    MissingTrailingNewline,

    #[error("meta record has {0} lines, expected 3")]
    WrongLineCount(usize),

    #[error("meta record {0} field is empty")]
    EmptyField(&'static str),

    #[error("meta record date {value:?} is invalid: {source}")]
    InvalidDate {
        value: String,
        source: chrono::format::ParseError,
    },
}

/// Repository engine errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// REPO-INV: every configured interval needs a keep entry.
    #[error("interval {0:?} has no keep entry")]
    MissingKeep(String),

    /// REPO-INV: every configured interval needs a keep_age entry.
    #[error("interval {0:?} has no keep_age entry")]
    MissingKeepAge(String),

    #[error("replicator exited with status {status} for source {source_path:?}")]
    ReplicatorFailed {
        status: i32,
        source_path: PathBuf,
        stderr: String,
    },

    #[error(transparent)]
    Replicator(#[from] ReplicatorError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Programmer error: the index has no snapshot with that folder name.
    #[error("snapshot {0:?} is not registered")]
    UnknownSnapshot(String),

    /// Programmer error: a snapshot with that folder name is already indexed.
    #[error("snapshot {0:?} is already registered")]
    DuplicateSnapshot(String),
}

impl RepositoryError {
    /// Wrap an io::Error with a human-readable context line.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_context() {
        let err = RepositoryError::io(
            "cannot scan destination /backup",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("cannot scan destination /backup"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_replicator_failed_message_names_the_source() {
        let err = RepositoryError::ReplicatorFailed {
            status: 23,
            source_path: PathBuf::from("/home"),
            stderr: String::new(),
        };
        let message = err.to_string();
        assert!(message.contains("23"));
        assert!(message.contains("/home"));
    }
}
