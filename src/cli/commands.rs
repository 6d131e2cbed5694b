//! CLI command implementations
//!
//! Every command starts from the configuration file; `run` additionally
//! installs the SIGINT handler that lets the scheduler loop stop cleanly.

use std::path::Path;
use std::sync::atomic::Ordering;

use chrono::Local;

use crate::config::Settings;
use crate::fsops;
use crate::manager::{BackupManager, RunEnd};
use crate::observability::{Logger, Severity};
use crate::repository::DATE_FORMAT;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Dispatch the parsed command line.
pub fn run_command(cli: Cli) -> CliResult<()> {
    let min = if cli.debug {
        Severity::Debug
    } else if cli.quiet {
        Severity::Warn
    } else {
        Severity::Info
    };
    let logger = Logger::new(min);

    match cli.command {
        Command::Run { config } => run(&config, logger),
        Command::Once { config } => once(&config, logger),
        Command::Status { config } => status(&config, logger),
    }
}

fn build_manager(config_path: &Path, logger: Logger) -> CliResult<BackupManager> {
    let settings = Settings::load(config_path)?;
    Ok(BackupManager::from_settings(&settings, logger)?)
}

/// Run the scheduler loop until interrupted.
fn run(config_path: &Path, logger: Logger) -> CliResult<()> {
    let mut manager = build_manager(config_path, logger)?;

    let flag = manager.interrupt_flag();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;

    match manager.run()? {
        RunEnd::Interrupted => Err(CliError::Interrupted),
    }
}

/// A single scheduling pass with the current wall-clock time.
fn once(config_path: &Path, logger: Logger) -> CliResult<()> {
    let mut manager = build_manager(config_path, logger)?;
    manager.run_once(Local::now().naive_local())?;
    Ok(())
}

/// Print the snapshot index of every repository, one JSON line per snapshot.
fn status(config_path: &Path, logger: Logger) -> CliResult<()> {
    let manager = build_manager(config_path, logger)?;
    for repository in manager.repositories() {
        for backup in repository.backups() {
            let line = serde_json::json!({
                "repository": repository.name(),
                "snapshot": backup.folder_name(),
                "date": backup.date().format(DATE_FORMAT).to_string(),
                "interval": backup.interval_name(),
                "physical": !fsops::is_symlink(&backup.data_path()),
            });
            println!("{}", line);
        }
    }
    Ok(())
}
