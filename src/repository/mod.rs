//! Repository engine
//!
//! A repository is a collection of snapshots sharing one destination
//! directory. The engine owns the in-memory snapshot index (rebuilt from disk
//! at every open), evaluates which intervals are due, creates one physical
//! snapshot per tick with symlinked peers for every other due interval, and
//! retires expired snapshots while collapsing the symlink topology so that
//! surviving snapshots keep their contents.
//!
//! # Index invariants
//!
//! - Every index entry corresponds to a finalized on-disk snapshot.
//! - Every `data/` symlink resolves to a peer's real `data/` inside the same
//!   repository.
//! - `keep` and `keep_age` cover every configured interval; this is checked
//!   at open, before the engine ever touches the filesystem.
//!
//! Snapshots are keyed by their folder name; the index is kept sorted by
//! (date, folder name) so scans and link-group decisions are deterministic.

mod errors;
mod folder;
mod meta;

pub use errors::{MetaError, RepositoryError, RepositoryResult};
pub use folder::{BackupFolder, FolderLoad};
pub use meta::{BackupMeta, MetaLoad, DATA_DIR_NAME, DATE_FORMAT, META_FILE_NAME};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};

use crate::config::RepositorySpec;
use crate::fsops;
use crate::observability::Logger;
use crate::replicator::{replicate, ReplicatorSpec};
use crate::schedule::Cronjob;

/// Name of the symlink in the destination that tracks the newest snapshot.
pub const LATEST_SYMLINK_NAME: &str = "latest";

/// A named schedule within a repository.
#[derive(Debug, Clone)]
struct Interval {
    name: String,
    cron: Cronjob,
}

/// A repository of snapshots under one destination directory.
pub struct Repository {
    name: String,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    intervals: Vec<Interval>,
    keep: HashMap<String, usize>,
    keep_age: HashMap<String, Duration>,
    replicator: ReplicatorSpec,
    logger: Logger,
    backups: Vec<BackupFolder>,
}

impl Repository {
    /// Open a repository: create the destination if needed, check the
    /// retention tables cover every interval, and rebuild the snapshot index
    /// from disk.
    pub fn open(spec: RepositorySpec, logger: Logger) -> RepositoryResult<Self> {
        fs::create_dir_all(&spec.destination).map_err(|e| {
            RepositoryError::io(
                format!("cannot create destination {}", spec.destination.display()),
                e,
            )
        })?;

        for (interval_name, _) in &spec.intervals {
            if !spec.keep.contains_key(interval_name) {
                return Err(RepositoryError::MissingKeep(interval_name.clone()));
            }
            if !spec.keep_age.contains_key(interval_name) {
                return Err(RepositoryError::MissingKeepAge(interval_name.clone()));
            }
        }

        let backups = Self::read_backups(&spec.name, &spec.destination, &logger)?;

        let mut repository = Self {
            name: spec.name,
            sources: spec.sources,
            destination: spec.destination,
            intervals: spec
                .intervals
                .into_iter()
                .map(|(name, cron)| Interval { name, cron })
                .collect(),
            keep: spec.keep,
            keep_age: spec.keep_age,
            replicator: spec.replicator,
            logger,
            backups,
        };
        repository.sort_index();
        Ok(repository)
    }

    /// Scan the destination for finalized snapshots.
    ///
    /// The `latest` symlink is skipped by name. Unfinished or malformed
    /// folders are logged and left alone; truth about them can only be
    /// decided by an operator.
    fn read_backups(
        name: &str,
        destination: &Path,
        logger: &Logger,
    ) -> RepositoryResult<Vec<BackupFolder>> {
        let mut backups = Vec::new();
        let entries = fs::read_dir(destination).map_err(|e| {
            RepositoryError::io(
                format!("cannot scan destination {}", destination.display()),
                e,
            )
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                RepositoryError::io(
                    format!("cannot scan destination {}", destination.display()),
                    e,
                )
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name == LATEST_SYMLINK_NAME {
                logger.debug(
                    "ignoring_latest_symlink",
                    &[("repository", name), ("entry", &file_name)],
                );
                continue;
            }
            let path = entry.path();
            if !path.is_dir() || fsops::is_symlink(&path) {
                logger.debug(
                    "ignoring_non_snapshot_entry",
                    &[("repository", name), ("entry", &file_name)],
                );
                continue;
            }
            match BackupFolder::open(path) {
                FolderLoad::Loaded(folder) => {
                    logger.debug(
                        "snapshot_indexed",
                        &[("repository", name), ("snapshot", &file_name)],
                    );
                    backups.push(folder);
                }
                FolderLoad::NotFinalized => {
                    logger.warn(
                        "skipping_unfinished_snapshot",
                        &[("repository", name), ("snapshot", &file_name)],
                    );
                }
                FolderLoad::Malformed(err) => {
                    logger.warn(
                        "skipping_malformed_snapshot",
                        &[
                            ("repository", name),
                            ("snapshot", &file_name),
                            ("reason", &err.to_string()),
                        ],
                    );
                }
            }
        }
        Ok(backups)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The current index, sorted by (date, folder name).
    pub fn backups(&self) -> &[BackupFolder] {
        &self.backups
    }

    fn sort_index(&mut self) {
        self.backups
            .sort_by(|a, b| (a.date(), a.folder_name()).cmp(&(b.date(), b.folder_name())));
    }

    fn find(&self, folder_name: &str) -> Option<&BackupFolder> {
        self.backups.iter().find(|b| b.folder_name() == folder_name)
    }

    fn register(&mut self, folder: BackupFolder) -> RepositoryResult<()> {
        let folder_name = folder.folder_name();
        if self.find(&folder_name).is_some() {
            return Err(RepositoryError::DuplicateSnapshot(folder_name));
        }
        self.logger.debug(
            "registering_snapshot",
            &[("repository", &self.name), ("snapshot", &folder_name)],
        );
        self.backups.push(folder);
        self.sort_index();
        Ok(())
    }

    fn unregister(&mut self, folder_name: &str) -> RepositoryResult<()> {
        let position = self
            .backups
            .iter()
            .position(|b| b.folder_name() == folder_name)
            .ok_or_else(|| RepositoryError::UnknownSnapshot(folder_name.to_string()))?;
        self.logger.debug(
            "unregistering_snapshot",
            &[("repository", &self.name), ("snapshot", folder_name)],
        );
        self.backups.remove(position);
        Ok(())
    }

    /// The newest snapshot of any interval, or `None` on an empty index.
    pub fn latest_backup(&self) -> Option<&BackupFolder> {
        self.backups.iter().max_by_key(|b| b.date())
    }

    fn latest_of_interval(&self, interval_name: &str) -> Option<&BackupFolder> {
        self.backups
            .iter()
            .filter(|b| b.interval_name() == interval_name)
            .max_by_key(|b| b.date())
    }

    /// Intervals that are due at `now`, in configured order.
    ///
    /// An interval is due when it has no snapshot yet, or when its schedule
    /// has fired since the date of its latest snapshot.
    pub fn necessary_intervals(&self, now: NaiveDateTime) -> Vec<String> {
        let mut due = Vec::new();
        for interval in &self.intervals {
            match self.latest_of_interval(&interval.name) {
                None => {
                    self.logger.debug(
                        "interval_due_no_snapshot",
                        &[("repository", &self.name), ("interval", &interval.name)],
                    );
                    due.push(interval.name.clone());
                }
                Some(latest) => {
                    if interval.cron.has_occurred_since(latest.date(), false, now) {
                        self.logger.debug(
                            "interval_due_schedule_fired",
                            &[("repository", &self.name), ("interval", &interval.name)],
                        );
                        due.push(interval.name.clone());
                    }
                }
            }
        }
        due
    }

    fn snapshot_folder_name(&self, now: NaiveDateTime, interval_name: &str) -> String {
        format!("{}-{}-{}", self.name, now.format(DATE_FORMAT), interval_name)
    }

    /// Create snapshots for every due interval.
    ///
    /// The first due interval gets one physical replication; every other due
    /// interval gets a peer directory whose `data/` symlinks to the physical
    /// copy. A snapshot only becomes visible once its meta record is written,
    /// so a crash or replicator failure anywhere in between leaves the next
    /// open unaffected.
    pub fn create_if_necessary(&mut self, now: NaiveDateTime) -> RepositoryResult<()> {
        let due = self.necessary_intervals(now);
        if due.is_empty() {
            self.logger
                .debug("no_backup_necessary", &[("repository", &self.name)]);
            return Ok(());
        }

        // Hardlink reference: the newest snapshot of any interval.
        let link_ref = self.latest_backup().map(|b| b.data_path());

        let primary_interval = due[0].clone();
        let folder_name = self.snapshot_folder_name(now, &primary_interval);
        let primary = BackupFolder::new(
            self.destination.join(&folder_name),
            BackupMeta::new(folder_name.clone(), now, primary_interval.clone()),
        );
        primary.prepare().map_err(|e| {
            RepositoryError::io(
                format!(
                    "cannot create snapshot directory {}",
                    primary.path().display()
                ),
                e,
            )
        })?;

        let data_path = primary.data_path();
        for source in &self.sources {
            self.logger.info(
                "replicating",
                &[
                    ("repository", &self.name),
                    ("snapshot", &folder_name),
                    ("source", &source.display().to_string()),
                ],
            );
            let outcome = replicate(&self.replicator, source, &data_path, link_ref.as_deref())?;
            if !outcome.success() {
                self.logger.error(
                    "replicator_failed",
                    &[
                        ("repository", &self.name),
                        ("snapshot", &folder_name),
                        ("source", &source.display().to_string()),
                        ("status", &outcome.status_code().to_string()),
                        ("stderr", &outcome.stderr),
                    ],
                );
                return Err(RepositoryError::ReplicatorFailed {
                    status: outcome.status_code(),
                    source_path: source.clone(),
                    stderr: outcome.stderr,
                });
            }
        }

        primary.write_meta().map_err(|e| {
            RepositoryError::io(
                format!("cannot write meta for {}", primary.path().display()),
                e,
            )
        })?;
        let primary_path = primary.path().to_path_buf();
        self.register(primary)?;
        self.relink_latest(&primary_path)?;
        self.logger.notice(
            "snapshot_created",
            &[
                ("repository", &self.name),
                ("snapshot", &folder_name),
                ("interval", &primary_interval),
            ],
        );

        for interval_name in &due[1..] {
            let peer_name = self.snapshot_folder_name(now, interval_name);
            let peer = BackupFolder::new(
                self.destination.join(&peer_name),
                BackupMeta::new(peer_name.clone(), now, interval_name.clone()),
            );
            peer.prepare().map_err(|e| {
                RepositoryError::io(
                    format!("cannot create snapshot directory {}", peer.path().display()),
                    e,
                )
            })?;
            fsops::create_symlink(&data_path, &peer.data_path()).map_err(|e| {
                RepositoryError::io(
                    format!("cannot link {} to {}", peer.path().display(), folder_name),
                    e,
                )
            })?;
            peer.write_meta().map_err(|e| {
                RepositoryError::io(format!("cannot write meta for {}", peer.path().display()), e)
            })?;
            self.register(peer)?;
            self.logger.notice(
                "snapshot_linked",
                &[
                    ("repository", &self.name),
                    ("snapshot", &peer_name),
                    ("interval", interval_name),
                    ("target", &folder_name),
                ],
            );
        }
        Ok(())
    }

    /// Re-point the `latest` symlink at `target` without a dangling window.
    fn relink_latest(&self, target: &Path) -> RepositoryResult<()> {
        let link = self.destination.join(LATEST_SYMLINK_NAME);
        self.logger.debug(
            "relinking_latest",
            &[
                ("repository", &self.name),
                ("target", &target.display().to_string()),
            ],
        );
        fsops::replace_symlink(target, &link).map_err(|e| {
            RepositoryError::io(format!("cannot update {}", link.display()), e)
        })
    }

    /// Folder names of snapshots that violate their interval's retention
    /// rules at `now`, deduplicated, in interval order.
    ///
    /// Count: the oldest `len - keep` snapshots of an interval are expired.
    /// Age: snapshots older than `now - keep_age` are expired. The cutoff is
    /// computed from `now` exactly once, here.
    pub fn expired_snapshots(&self, now: NaiveDateTime) -> RepositoryResult<Vec<String>> {
        let mut expired = Vec::new();
        let mut seen = HashSet::new();
        for interval in &self.intervals {
            let keep = *self
                .keep
                .get(&interval.name)
                .ok_or_else(|| RepositoryError::MissingKeep(interval.name.clone()))?;
            let keep_age = *self
                .keep_age
                .get(&interval.name)
                .ok_or_else(|| RepositoryError::MissingKeepAge(interval.name.clone()))?;

            let mut of_interval: Vec<&BackupFolder> = self
                .backups
                .iter()
                .filter(|b| b.interval_name() == interval.name)
                .collect();
            of_interval.sort_by_key(|b| b.date());

            if of_interval.len() > keep {
                for folder in &of_interval[..of_interval.len() - keep] {
                    self.logger.debug(
                        "expired_by_count",
                        &[
                            ("repository", &self.name),
                            ("snapshot", &folder.folder_name()),
                            ("keep", &keep.to_string()),
                        ],
                    );
                    if seen.insert(folder.folder_name()) {
                        expired.push(folder.folder_name());
                    }
                }
            }

            let cutoff = now - keep_age;
            for folder in &of_interval {
                if folder.date() < cutoff {
                    self.logger.debug(
                        "expired_by_age",
                        &[
                            ("repository", &self.name),
                            ("snapshot", &folder.folder_name()),
                            ("cutoff", &cutoff.format(DATE_FORMAT).to_string()),
                        ],
                    );
                    if seen.insert(folder.folder_name()) {
                        expired.push(folder.folder_name());
                    }
                }
            }
        }
        Ok(expired)
    }

    /// Remove every expired snapshot, keeping shared data alive.
    ///
    /// A snapshot whose `data/` is a symlink is just deleted. A snapshot that
    /// holds the physical data of a link group promotes one peer first: the
    /// peer's symlink is removed, the data directory is moved into its place,
    /// and every remaining peer is re-pointed. Sub-step order matters:
    /// removing the symlink first frees the rename target, and moving before
    /// deleting the old directory means no registered snapshot ever loses its
    /// `data/`.
    pub fn handle_expired(&mut self, now: NaiveDateTime) -> RepositoryResult<()> {
        let expired = self.expired_snapshots(now)?;
        if expired.is_empty() {
            self.logger
                .debug("no_expired_snapshots", &[("repository", &self.name)]);
            return Ok(());
        }
        let expired_set: HashSet<String> = expired.iter().cloned().collect();

        for folder_name in &expired {
            // Earlier iterations may have rewritten the group topology;
            // resolve everything against the live index.
            let Some(folder) = self.find(folder_name) else {
                continue;
            };
            let folder_path = folder.path().to_path_buf();
            let data_path = folder.data_path();
            self.logger.info(
                "expiring_snapshot",
                &[("repository", &self.name), ("snapshot", folder_name)],
            );

            if fsops::is_symlink(&data_path) {
                fsops::remove_recursive(&folder_path).map_err(|e| {
                    RepositoryError::io(
                        format!("cannot remove snapshot {}", folder_path.display()),
                        e,
                    )
                })?;
                self.unregister(folder_name)?;
            } else {
                let peers = self.link_peers(folder_name, &data_path);
                if peers.is_empty() {
                    fsops::remove_recursive(&folder_path).map_err(|e| {
                        RepositoryError::io(
                            format!("cannot remove snapshot {}", folder_path.display()),
                            e,
                        )
                    })?;
                    self.unregister(folder_name)?;
                } else {
                    self.promote_peer(folder_name, &folder_path, &data_path, &peers, &expired_set)?;
                }
            }
            self.logger.notice(
                "snapshot_removed",
                &[("repository", &self.name), ("snapshot", folder_name)],
            );
        }
        Ok(())
    }

    /// Symlink peers of a physical snapshot, in index order: registered
    /// snapshots whose `data/` symlink resolves to the same directory.
    ///
    /// A peer whose link no longer resolves is not part of the group.
    fn link_peers(&self, folder_name: &str, data_path: &Path) -> Vec<String> {
        self.backups
            .iter()
            .filter(|b| b.folder_name() != folder_name)
            .filter(|b| fsops::is_symlink(&b.data_path()))
            .filter(|b| matches!(fsops::same_file(&b.data_path(), data_path), Ok(true)))
            .map(|b| b.folder_name())
            .collect()
    }

    /// Move the expiring snapshot's data into one peer and re-point the rest.
    ///
    /// The promotion target is preferably a peer that is not itself expired,
    /// so a link group shrinks in one pass instead of cascading moves.
    fn promote_peer(
        &mut self,
        folder_name: &str,
        folder_path: &Path,
        data_path: &Path,
        peers: &[String],
        expired_set: &HashSet<String>,
    ) -> RepositoryResult<()> {
        let target = peers
            .iter()
            .find(|p| !expired_set.contains(p.as_str()))
            .unwrap_or(&peers[0])
            .clone();
        let target_data = self
            .find(&target)
            .ok_or_else(|| RepositoryError::UnknownSnapshot(target.clone()))?
            .data_path();

        self.logger.info(
            "promoting_peer",
            &[
                ("repository", &self.name),
                ("snapshot", folder_name),
                ("target", &target),
            ],
        );

        fsops::remove_symlink(&target_data).map_err(|e| {
            RepositoryError::io(format!("cannot remove symlink {}", target_data.display()), e)
        })?;
        fsops::move_dir(data_path, &target_data).map_err(|e| {
            RepositoryError::io(
                format!(
                    "cannot move {} to {}",
                    data_path.display(),
                    target_data.display()
                ),
                e,
            )
        })?;
        fsops::remove_recursive(folder_path).map_err(|e| {
            RepositoryError::io(format!("cannot remove snapshot {}", folder_path.display()), e)
        })?;
        self.unregister(folder_name)?;

        for peer_name in peers.iter().filter(|p| **p != target) {
            let peer_data = self
                .find(peer_name)
                .ok_or_else(|| RepositoryError::UnknownSnapshot(peer_name.clone()))?
                .data_path();
            fsops::remove_symlink(&peer_data).map_err(|e| {
                RepositoryError::io(format!("cannot remove symlink {}", peer_data.display()), e)
            })?;
            fsops::create_symlink(&target_data, &peer_data).map_err(|e| {
                RepositoryError::io(
                    format!(
                        "cannot link {} to {}",
                        peer_data.display(),
                        target_data.display()
                    ),
                    e,
                )
            })?;
        }
        Ok(())
    }
}
