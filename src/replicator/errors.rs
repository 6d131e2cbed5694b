//! Replicator error types

use std::io;

use thiserror::Error;

/// Errors from launching the external replicator.
///
/// A non-zero exit of a successfully launched child is not an error at this
/// layer; see `ReplicationOutcome`.
#[derive(Debug, Error)]
pub enum ReplicatorError {
    #[error("failed to launch replicator {command:?}: {source}")]
    Spawn { command: String, source: io::Error },
}
