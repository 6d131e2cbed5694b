//! Configuration
//!
//! linkvault is configured by one JSON file:
//!
//! ```json
//! {
//!   "tick_seconds": 300,
//!   "repositories": [{
//!     "name": "home",
//!     "sources": ["/home"],
//!     "destination": "/backup/home",
//!     "intervals": [{"name": "hourly", "cron": "0 * * * *"}],
//!     "keep": {"hourly": 24},
//!     "keep_age": {"hourly": "2d"},
//!     "replicator": {"cmd": "rsync", "args": ["-a", "--delete"]}
//!   }]
//! }
//! ```
//!
//! `Settings::load` checks structure; `RepositoryConfig::resolve` turns the
//! raw values into the typed spec the engine consumes (parsed cron jobs,
//! parsed durations). Whether `keep`/`keep_age` cover every interval is the
//! engine's own precondition and is checked at `Repository::open`.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::replicator::ReplicatorSpec;
use crate::schedule::Cronjob;

/// Top-level configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Seconds between scheduler ticks (optional, default 300)
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Backup repositories (at least one required)
    pub repositories: Vec<RepositoryConfig>,
}

fn default_tick_seconds() -> u64 {
    300
}

/// One repository as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub destination: PathBuf,
    /// Ordered: the first due interval of a tick holds the physical copy.
    pub intervals: Vec<IntervalConfig>,
    /// Max snapshot count per interval name
    pub keep: HashMap<String, usize>,
    /// Max snapshot age per interval name (`30m`, `12h`, `7d`, `4w`)
    pub keep_age: HashMap<String, String>,
    #[serde(default)]
    pub replicator: ReplicatorConfig,
}

/// A named cron schedule
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    pub name: String,
    pub cron: String,
}

/// External replicator invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    #[serde(default = "default_replicator_cmd")]
    pub cmd: String,
    #[serde(default = "default_replicator_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub log_opts: Vec<String>,
}

fn default_replicator_cmd() -> String {
    "rsync".to_string()
}

fn default_replicator_args() -> Vec<String> {
    vec!["-a".to_string(), "--delete".to_string()]
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            cmd: default_replicator_cmd(),
            args: default_replicator_args(),
            filter: Vec::new(),
            log_opts: Vec::new(),
        }
    }
}

/// The typed repository spec consumed by the engine.
#[derive(Debug, Clone)]
pub struct RepositorySpec {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub destination: PathBuf,
    pub intervals: Vec<(String, Cronjob)>,
    pub keep: HashMap<String, usize>,
    pub keep_age: HashMap<String, Duration>,
    pub replicator: ReplicatorSpec,
}

impl Settings {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Structural validation
    fn validate(&self) -> ConfigResult<()> {
        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        for repo in &self.repositories {
            repo.validate()?;
        }
        Ok(())
    }
}

impl RepositoryConfig {
    fn validate(&self) -> ConfigResult<()> {
        let invalid = |problem: &str| ConfigError::InvalidRepository {
            repo: self.name.clone(),
            problem: problem.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.sources.is_empty() {
            return Err(invalid("at least one source is required"));
        }
        if self.intervals.is_empty() {
            return Err(invalid("at least one interval is required"));
        }
        let mut names = std::collections::HashSet::new();
        for interval in &self.intervals {
            if interval.name.is_empty() {
                return Err(invalid("interval names must not be empty"));
            }
            if !names.insert(interval.name.as_str()) {
                return Err(invalid("interval names must be unique"));
            }
        }
        for (interval, keep) in &self.keep {
            if *keep == 0 {
                return Err(ConfigError::InvalidRepository {
                    repo: self.name.clone(),
                    problem: format!("keep for interval {:?} must be positive", interval),
                });
            }
        }
        Ok(())
    }

    /// Resolve the raw values into the typed spec the engine consumes.
    pub fn resolve(&self) -> ConfigResult<RepositorySpec> {
        let mut intervals = Vec::with_capacity(self.intervals.len());
        for interval in &self.intervals {
            let cron = Cronjob::new(&interval.cron).map_err(|source| ConfigError::InvalidCron {
                repo: self.name.clone(),
                interval: interval.name.clone(),
                source,
            })?;
            intervals.push((interval.name.clone(), cron));
        }

        let mut keep_age = HashMap::with_capacity(self.keep_age.len());
        for (interval, value) in &self.keep_age {
            let duration =
                parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
                    repo: self.name.clone(),
                    interval: interval.clone(),
                    value: value.clone(),
                })?;
            keep_age.insert(interval.clone(), duration);
        }

        Ok(RepositorySpec {
            name: self.name.clone(),
            sources: self.sources.clone(),
            destination: self.destination.clone(),
            intervals,
            keep: self.keep.clone(),
            keep_age,
            replicator: ReplicatorSpec {
                cmd: self.replicator.cmd.clone(),
                args: self.replicator.args.clone(),
                filter: self.replicator.filter.clone(),
                log_opts: self.replicator.log_opts.clone(),
            },
        })
    }
}

/// Parse a duration like `30m`, `12h`, `7d` or `4w`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let amount: i64 = digits.parse().ok()?;
    match unit {
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    }
}
