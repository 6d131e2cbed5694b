//! Command-line interface for linkvault

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run_command;
pub use errors::{
    CliError, CliResult, EXIT_CONFIG, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_MISSING_KEEP,
    EXIT_MISSING_KEEP_AGE, EXIT_REPLICATOR_FAILED,
};
