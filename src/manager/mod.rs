//! Backup manager
//!
//! The manager is deliberately thin: it owns the repositories and a tick
//! period, and on every tick asks each repository to create whatever is due
//! and then retire whatever has expired, strictly in that order, one
//! repository at a time. All time arithmetic happens in the repositories;
//! the manager only supplies the current wall-clock time.

mod errors;
mod lock;

pub use errors::ManagerError;
pub use lock::{RepositoryLock, LOCK_FILE_NAME};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Local, NaiveDateTime};

use crate::config::Settings;
use crate::observability::Logger;
use crate::repository::Repository;

/// Why the run loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RunEnd {
    Interrupted,
}

/// Drives all configured repositories on a fixed tick.
pub struct BackupManager {
    repositories: Vec<Repository>,
    tick: StdDuration,
    logger: Logger,
    interrupted: Arc<AtomicBool>,
}

impl BackupManager {
    /// Resolve every configured repository and open it.
    pub fn from_settings(settings: &Settings, logger: Logger) -> Result<Self, ManagerError> {
        let mut repositories = Vec::with_capacity(settings.repositories.len());
        for config in &settings.repositories {
            let spec = config.resolve()?;
            repositories.push(Repository::open(spec, logger)?);
        }
        Ok(Self {
            repositories,
            tick: StdDuration::from_secs(settings.tick_seconds),
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that makes the run loop stop at the next blocking return.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// One pass: per repository, create due snapshots, then expire old ones.
    ///
    /// A repository whose destination is locked by another live process is
    /// skipped for this tick with a warning.
    pub fn run_once(&mut self, now: NaiveDateTime) -> Result<(), ManagerError> {
        for repository in &mut self.repositories {
            let _lock = match RepositoryLock::acquire(repository.destination()) {
                Ok(Some(lock)) => lock,
                Ok(None) => {
                    self.logger.warn(
                        "repository_locked",
                        &[("repository", repository.name())],
                    );
                    continue;
                }
                Err(source) => {
                    return Err(ManagerError::Lock {
                        repo: repository.name().to_string(),
                        source,
                    });
                }
            };
            repository.create_if_necessary(now)?;
            repository.handle_expired(now)?;
        }
        Ok(())
    }

    /// Tick forever; returns when the interrupt flag is raised.
    ///
    /// The sleep between ticks is sliced so an interrupt is observed within
    /// about a second, without waking anything else up.
    pub fn run(&mut self) -> Result<RunEnd, ManagerError> {
        self.logger.info(
            "manager_started",
            &[
                ("repositories", &self.repositories.len().to_string()),
                ("tick_seconds", &self.tick.as_secs().to_string()),
            ],
        );
        loop {
            if self.interrupted.load(Ordering::Relaxed) {
                self.logger.notice("manager_interrupted", &[]);
                return Ok(RunEnd::Interrupted);
            }
            self.run_once(Local::now().naive_local())?;

            let mut remaining = self.tick;
            while !remaining.is_zero() {
                if self.interrupted.load(Ordering::Relaxed) {
                    self.logger.notice("manager_interrupted", &[]);
                    return Ok(RunEnd::Interrupted);
                }
                let slice = remaining.min(StdDuration::from_secs(1));
                thread::sleep(slice);
                remaining -= slice;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntervalConfig, ReplicatorConfig, RepositoryConfig};
    use crate::observability::Severity;
    use std::collections::HashMap;
    use std::fs;
    use std::process;
    use tempfile::TempDir;

    /// A replicator that copies the source tree with plain shell tools; the
    /// script takes the last two argv entries so an extra --link-dest slips
    /// through harmlessly.
    fn copy_replicator() -> ReplicatorConfig {
        ReplicatorConfig {
            cmd: "sh".to_string(),
            args: vec![
                "-ec".to_string(),
                r#"eval "dst=\${$#}"; eval "src=\${$(($#-1))}"; mkdir -p "$dst"; cp -R "$src/." "$dst""#
                    .to_string(),
            ],
            filter: vec![],
            log_opts: vec![],
        }
    }

    fn settings_for(source: &std::path::Path, destination: &std::path::Path) -> Settings {
        Settings {
            tick_seconds: 1,
            repositories: vec![RepositoryConfig {
                name: "repo".to_string(),
                sources: vec![source.to_path_buf()],
                destination: destination.to_path_buf(),
                intervals: vec![IntervalConfig {
                    name: "hourly".to_string(),
                    cron: "0 * * * *".to_string(),
                }],
                keep: HashMap::from([("hourly".to_string(), 3)]),
                keep_age: HashMap::from([("hourly".to_string(), "4w".to_string())]),
                replicator: copy_replicator(),
            }],
        }
    }

    #[test]
    fn test_run_once_creates_a_snapshot() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        let destination = tmp.path().join("backup");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("file.txt"), b"hello").unwrap();

        let settings = settings_for(&source, &destination);
        let mut manager =
            BackupManager::from_settings(&settings, Logger::new(Severity::Error)).unwrap();

        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        manager.run_once(now).unwrap();

        let snapshot = destination.join("repo-2024-01-02T00:00:00-hourly");
        assert!(snapshot.join("meta").is_file());
        assert_eq!(
            fs::read(snapshot.join("data").join("file.txt")).unwrap(),
            b"hello"
        );
        // The tick released the lock.
        assert!(!destination.join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_run_once_skips_locked_repository() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        let destination = tmp.path().join("backup");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&destination).unwrap();
        // Lock held by a live process (ourselves).
        fs::write(
            destination.join(LOCK_FILE_NAME),
            format!("{}\n", process::id()),
        )
        .unwrap();

        let settings = settings_for(&source, &destination);
        let mut manager =
            BackupManager::from_settings(&settings, Logger::new(Severity::Error)).unwrap();

        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        manager.run_once(now).unwrap();

        // Nothing was created while the destination was locked.
        assert!(manager.repositories()[0].backups().is_empty());
    }

    #[test]
    fn test_interrupt_flag_shared() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        fs::create_dir(&source).unwrap();
        let settings = settings_for(&source, &tmp.path().join("backup"));
        let manager =
            BackupManager::from_settings(&settings, Logger::new(Severity::Error)).unwrap();

        let flag = manager.interrupt_flag();
        flag.store(true, Ordering::Relaxed);
        assert!(manager.interrupted.load(Ordering::Relaxed));
    }
}
