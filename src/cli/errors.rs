//! CLI error types and process exit codes

use thiserror::Error;

use crate::config::ConfigError;
use crate::manager::ManagerError;
use crate::repository::RepositoryError;

/// Generic failure
pub const EXIT_FAILURE: i32 = 1;
/// Configuration file unreadable or invalid
pub const EXIT_CONFIG: i32 = 3;
/// The external replicator exited non-zero
pub const EXIT_REPLICATOR_FAILED: i32 = 8;
/// An interval has no keep entry
pub const EXIT_MISSING_KEEP: i32 = 9;
/// An interval has no keep_age entry
pub const EXIT_MISSING_KEEP_AGE: i32 = 10;
/// Stopped by SIGINT
pub const EXIT_INTERRUPTED: i32 = 130;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("interrupted")]
    Interrupted,
}

impl CliError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => EXIT_CONFIG,
            CliError::Manager(ManagerError::Config(_)) => EXIT_CONFIG,
            CliError::Manager(ManagerError::Repository(err)) => match err {
                RepositoryError::ReplicatorFailed { .. } => EXIT_REPLICATOR_FAILED,
                RepositoryError::MissingKeep(_) => EXIT_MISSING_KEEP,
                RepositoryError::MissingKeepAge(_) => EXIT_MISSING_KEEP_AGE,
                _ => EXIT_FAILURE,
            },
            CliError::Manager(ManagerError::Lock { .. }) => EXIT_FAILURE,
            CliError::Signal(_) => EXIT_FAILURE,
            CliError::Interrupted => EXIT_INTERRUPTED,
        }
    }
}
