//! Manager error types

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::repository::RepositoryError;

/// Errors from driving the repositories.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("cannot lock repository {repo:?}: {source}")]
    Lock {
        repo: String,
        #[source]
        source: io::Error,
    },
}
