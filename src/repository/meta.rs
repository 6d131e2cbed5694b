//! Per-snapshot meta record
//!
//! Three LF-terminated lines in fixed order, with a trailing newline:
//!
//! ```text
//! line 0: folder name
//! line 1: date, %Y-%m-%dT%H:%M:%S
//! line 2: interval name
//! ```
//!
//! Parsing is strict: a missing trailing newline, a wrong line count, or an
//! unparseable date makes the record malformed. A malformed record never
//! panics the engine; the snapshot is simply skipped at open.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use super::errors::MetaError;

/// File name of the meta record inside a snapshot directory.
pub const META_FILE_NAME: &str = "meta";

/// Directory name of the replicated tree inside a snapshot directory.
pub const DATA_DIR_NAME: &str = "data";

/// Date format used in meta records and snapshot folder names.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The decoded meta record of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMeta {
    pub name: String,
    pub date: NaiveDateTime,
    pub interval: String,
}

/// Outcome of loading a meta file from disk.
#[derive(Debug)]
pub enum MetaLoad {
    /// No meta file at that path.
    Absent,
    /// A meta file exists but cannot be used.
    Malformed(MetaError),
    Loaded(BackupMeta),
}

impl BackupMeta {
    pub fn new(name: String, date: NaiveDateTime, interval: String) -> Self {
        Self {
            name,
            date,
            interval,
        }
    }

    /// Serialize to the on-disk record.
    pub fn to_record(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.name,
            self.date.format(DATE_FORMAT),
            self.interval
        )
    }

    /// Parse an on-disk record.
    pub fn parse(text: &str) -> Result<Self, MetaError> {
        if !text.ends_with('\n') {
            return Err(MetaError::MissingTrailingNewline);
        }
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() != 3 {
            return Err(MetaError::WrongLineCount(lines.len()));
        }

        let name = lines[0].trim();
        if name.is_empty() {
            return Err(MetaError::EmptyField("name"));
        }

        let date_text = lines[1].trim();
        let date = NaiveDateTime::parse_from_str(date_text, DATE_FORMAT).map_err(|source| {
            MetaError::InvalidDate {
                value: date_text.to_string(),
                source,
            }
        })?;

        let interval = lines[2].trim();
        if interval.is_empty() {
            return Err(MetaError::EmptyField("interval"));
        }

        Ok(Self {
            name: name.to_string(),
            date,
            interval: interval.to_string(),
        })
    }

    /// Load and parse the meta file at `path`.
    pub fn load(path: &Path) -> MetaLoad {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return MetaLoad::Absent,
            Err(err) => return MetaLoad::Malformed(MetaError::Unreadable(err)),
        };
        match Self::parse(&text) {
            Ok(meta) => MetaLoad::Loaded(meta),
            Err(err) => MetaLoad::Malformed(err),
        }
    }

    /// Write the record to `path` via a temp file and rename.
    ///
    /// A crash mid-write leaves only the temp file behind, so the snapshot
    /// stays unfinalized.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let tmp = path.with_extension("tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(self.to_record().as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    }
}
