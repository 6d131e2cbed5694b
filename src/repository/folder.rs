//! One on-disk snapshot directory
//!
//! A snapshot directory has exactly two children: the `data/` tree (a real
//! directory, or a symlink to a peer's `data/`) and the `meta` record. A
//! snapshot is finalized iff both entries exist; anything else is an
//! in-progress or aborted snapshot and stays invisible to the engine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::fsops;

use super::errors::MetaError;
use super::meta::{BackupMeta, MetaLoad, DATA_DIR_NAME, META_FILE_NAME};

/// One snapshot directory together with its decoded meta record.
#[derive(Debug, Clone)]
pub struct BackupFolder {
    path: PathBuf,
    meta: BackupMeta,
}

/// Outcome of loading a snapshot directory from disk.
#[derive(Debug)]
pub enum FolderLoad {
    /// `meta` or `data/` is missing; not a usable snapshot.
    NotFinalized,
    /// Both entries exist, but the meta record is unusable.
    Malformed(MetaError),
    Loaded(BackupFolder),
}

impl BackupFolder {
    /// A snapshot that does not exist on disk yet.
    pub fn new(path: PathBuf, meta: BackupMeta) -> Self {
        Self { path, meta }
    }

    /// Load a snapshot directory, requiring it to be finalized.
    pub fn open(path: PathBuf) -> FolderLoad {
        let meta_path = path.join(META_FILE_NAME);
        let data_path = path.join(DATA_DIR_NAME);
        // The data entry may be a symlink, possibly dangling; presence of the
        // directory entry is what finalization means.
        if !meta_path.is_file() || !fsops::entry_exists(&data_path) {
            return FolderLoad::NotFinalized;
        }
        match BackupMeta::load(&meta_path) {
            MetaLoad::Absent => FolderLoad::NotFinalized,
            MetaLoad::Malformed(err) => FolderLoad::Malformed(err),
            MetaLoad::Loaded(meta) => FolderLoad::Loaded(Self { path, meta }),
        }
    }

    /// Create the snapshot directory. Fails if it already exists.
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir(&self.path)
    }

    /// Write the meta record, finalizing the snapshot.
    pub fn write_meta(&self) -> io::Result<()> {
        self.meta.write(&self.meta_path())
    }

    /// Both `meta` and `data/` present on disk.
    pub fn is_finished(&self) -> bool {
        self.meta_path().is_file() && fsops::entry_exists(&self.data_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory name, which doubles as the snapshot id.
    pub fn folder_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The name recorded in the meta file.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn date(&self) -> NaiveDateTime {
        self.meta.date
    }

    pub fn interval_name(&self) -> &str {
        &self.meta.interval
    }

    /// `<path>/data`
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_DIR_NAME)
    }

    /// `<path>/meta`
    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn meta_for(name: &str, interval: &str) -> BackupMeta {
        BackupMeta::new(
            name.to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
            interval.to_string(),
        )
    }

    #[test]
    fn test_prepare_then_finalize() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("repo-2024-01-02T03:04:05-hourly");
        let folder = BackupFolder::new(path.clone(), meta_for("repo-2024-01-02T03:04:05-hourly", "hourly"));

        folder.prepare().unwrap();
        assert!(!folder.is_finished());

        fs::create_dir(folder.data_path()).unwrap();
        assert!(!folder.is_finished());

        folder.write_meta().unwrap();
        assert!(folder.is_finished());
    }

    #[test]
    fn test_prepare_fails_on_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap");
        fs::create_dir(&path).unwrap();

        let folder = BackupFolder::new(path, meta_for("snap", "hourly"));
        assert!(folder.prepare().is_err());
    }

    #[test]
    fn test_open_round_trips_accessors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap");
        let folder = BackupFolder::new(path.clone(), meta_for("snap", "daily"));
        folder.prepare().unwrap();
        fs::create_dir(folder.data_path()).unwrap();
        folder.write_meta().unwrap();

        match BackupFolder::open(path.clone()) {
            FolderLoad::Loaded(loaded) => {
                assert_eq!(loaded.folder_name(), "snap");
                assert_eq!(loaded.name(), "snap");
                assert_eq!(loaded.interval_name(), "daily");
                assert_eq!(loaded.date(), folder.date());
                assert_eq!(loaded.data_path(), path.join("data"));
                assert_eq!(loaded.meta_path(), path.join("meta"));
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[test]
    fn test_open_rejects_missing_meta() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap");
        fs::create_dir(&path).unwrap();
        fs::create_dir(path.join("data")).unwrap();

        assert!(matches!(
            BackupFolder::open(path),
            FolderLoad::NotFinalized
        ));
    }

    #[test]
    fn test_open_rejects_missing_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap");
        let folder = BackupFolder::new(path.clone(), meta_for("snap", "hourly"));
        folder.prepare().unwrap();
        folder.write_meta().unwrap();

        assert!(matches!(
            BackupFolder::open(path),
            FolderLoad::NotFinalized
        ));
    }

    #[test]
    fn test_open_reports_malformed_meta() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap");
        fs::create_dir(&path).unwrap();
        fs::create_dir(path.join("data")).unwrap();
        fs::write(path.join("meta"), "only one line\n").unwrap();

        assert!(matches!(
            BackupFolder::open(path),
            FolderLoad::Malformed(MetaError::WrongLineCount(1))
        ));
    }

    #[test]
    fn test_symlinked_data_counts_as_finalized() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real-data");
        fs::create_dir(&real).unwrap();

        let path = tmp.path().join("snap");
        let folder = BackupFolder::new(path.clone(), meta_for("snap", "daily"));
        folder.prepare().unwrap();
        fsops::create_symlink(&real, &folder.data_path()).unwrap();
        folder.write_meta().unwrap();

        assert!(folder.is_finished());
        assert!(matches!(BackupFolder::open(path), FolderLoad::Loaded(_)));
    }
}
