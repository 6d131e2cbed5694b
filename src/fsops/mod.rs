//! Filesystem primitives for the snapshot engine
//!
//! Thin wrappers around `std::fs` with the exact semantics the repository
//! engine relies on:
//!
//! - symlink removal refuses to touch anything that is not a symlink
//! - `replace_symlink` re-points a link atomically (temp link + rename)
//! - `same_file` compares the resolved (device, inode) pair, so a symlink
//!   and the directory it points at compare equal
//!
//! All functions are Unix-only, like the replicator contract itself.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Create a symlink at `link` pointing to `target`.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    symlink(target, link)
}

/// Remove the symlink at `link`.
///
/// Fails with `InvalidInput` if `link` is not a symlink, so a plain directory
/// can never be deleted through this path.
pub fn remove_symlink(link: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(link)?;
    if !meta.file_type().is_symlink() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a symlink: {}", link.display()),
        ));
    }
    fs::remove_file(link)
}

/// Re-point `link` at `target` without a window where `link` is missing.
///
/// A temporary sibling symlink is created and renamed over `link`; rename
/// replaces the destination in one step on POSIX filesystems.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let file_name = link
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "link path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = link.with_file_name(tmp_name);

    // A leftover temp link from an earlier crash just gets overwritten.
    if fs::symlink_metadata(&tmp).is_ok() {
        fs::remove_file(&tmp)?;
    }
    symlink(target, &tmp)?;
    fs::rename(&tmp, link)
}

/// Delete a directory tree.
pub fn remove_recursive(path: &Path) -> io::Result<()> {
    fs::remove_dir_all(path)
}

/// Atomically move a directory to a new path on the same filesystem.
pub fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Whether `path` is a symlink (the entry itself, not its target).
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Whether a directory entry exists at `path`, without following symlinks.
///
/// A dangling symlink still counts as present.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether `a` and `b` refer to the same underlying file or directory.
///
/// Symlinks are followed on both sides; the comparison is on (device, inode).
pub fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    let ma = fs::metadata(a)?;
    let mb = fs::metadata(b)?;
    Ok(ma.dev() == mb.dev() && ma.ino() == mb.ino())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_remove_symlink() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        fs::create_dir(&target).unwrap();

        create_symlink(&target, &link).unwrap();
        assert!(is_symlink(&link));
        assert_eq!(fs::read_link(&link).unwrap(), target);

        remove_symlink(&link).unwrap();
        assert!(!entry_exists(&link));
        // Target untouched
        assert!(target.is_dir());
    }

    #[test]
    fn test_remove_symlink_refuses_directories() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        fs::create_dir(&dir).unwrap();

        let err = remove_symlink(&dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_replace_symlink_repoints() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let link = tmp.path().join("latest");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();

        replace_symlink(&first, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), first);

        replace_symlink(&second, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), second);

        // No temp link left behind
        assert!(!entry_exists(&tmp.path().join(".latest.tmp")));
    }

    #[test]
    fn test_same_file_follows_symlinks() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        let link = tmp.path().join("link");
        let other = tmp.path().join("other");
        fs::create_dir(&real).unwrap();
        fs::create_dir(&other).unwrap();
        create_symlink(&real, &link).unwrap();

        assert!(same_file(&link, &real).unwrap());
        assert!(!same_file(&link, &other).unwrap());
    }

    #[test]
    fn test_same_file_dangling_symlink_errors() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone");
        let link = tmp.path().join("link");
        create_symlink(&gone, &link).unwrap();

        assert!(same_file(&link, tmp.path()).is_err());
    }

    #[test]
    fn test_entry_exists_sees_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone");
        let link = tmp.path().join("link");
        create_symlink(&gone, &link).unwrap();

        assert!(entry_exists(&link));
        assert!(!gone.exists());
    }

    #[test]
    fn test_move_dir() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("from");
        let to = tmp.path().join("to");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("file"), b"payload").unwrap();

        move_dir(&from, &to).unwrap();
        assert!(!entry_exists(&from));
        assert_eq!(fs::read(to.join("file")).unwrap(), b"payload");
    }
}
