//! Per-repository lock file
//!
//! A repository destination is meant to be driven by one engine at a time.
//! The lock is a file in the destination containing the owner's pid; a lock
//! whose owner is no longer alive (no `/proc/<pid>`) is stale and gets
//! broken.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Name of the lock file inside a repository destination.
pub const LOCK_FILE_NAME: &str = ".linkvault.lock";

/// Holds the lock for one repository destination; released on drop.
#[derive(Debug)]
pub struct RepositoryLock {
    path: PathBuf,
}

impl RepositoryLock {
    /// Try to take the lock. `Ok(None)` means another live process holds it.
    pub fn acquire(destination: &Path) -> io::Result<Option<Self>> {
        let path = destination.join(LOCK_FILE_NAME);
        for _ in 0..3 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", process::id())?;
                    return Ok(Some(Self { path }));
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let pid = match fs::read_to_string(&path) {
                        Ok(text) => text.trim().parse::<u32>().ok(),
                        Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(err),
                    };
                    if let Some(pid) = pid {
                        if Path::new("/proc").join(pid.to_string()).exists() {
                            return Ok(None);
                        }
                    }
                    // Owner is gone (or the file is garbage): break the lock.
                    match fs::remove_file(&path) {
                        Ok(()) => continue,
                        Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let tmp = TempDir::new().unwrap();
        let lock = RepositoryLock::acquire(tmp.path()).unwrap().unwrap();
        assert!(tmp.path().join(LOCK_FILE_NAME).is_file());

        drop(lock);
        assert!(!tmp.path().join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_live_lock_is_respected() {
        let tmp = TempDir::new().unwrap();
        // A lock held by this very process: definitely alive.
        fs::write(
            tmp.path().join(LOCK_FILE_NAME),
            format!("{}\n", process::id()),
        )
        .unwrap();

        assert!(RepositoryLock::acquire(tmp.path()).unwrap().is_none());
        // The live lock must not be deleted.
        assert!(tmp.path().join(LOCK_FILE_NAME).is_file());
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let tmp = TempDir::new().unwrap();
        // Far outside the pid range of any running process.
        fs::write(tmp.path().join(LOCK_FILE_NAME), "4294967294\n").unwrap();

        let lock = RepositoryLock::acquire(tmp.path()).unwrap();
        assert!(lock.is_some());
    }

    #[test]
    fn test_garbage_lock_is_broken() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(LOCK_FILE_NAME), "not a pid\n").unwrap();

        let lock = RepositoryLock::acquire(tmp.path()).unwrap();
        assert!(lock.is_some());
    }
}
