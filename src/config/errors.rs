//! Configuration error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::schedule::ScheduleError;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {path:?} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no repositories configured")]
    NoRepositories,

    #[error("repository {repo:?}: {problem}")]
    InvalidRepository { repo: String, problem: String },

    #[error("repository {repo:?}, interval {interval:?}: {source}")]
    InvalidCron {
        repo: String,
        interval: String,
        #[source]
        source: ScheduleError,
    },

    #[error("repository {repo:?}: keep_age {value:?} for interval {interval:?} is not a duration")]
    InvalidDuration {
        repo: String,
        interval: String,
        value: String,
    },
}
