//! Replicator adapter
//!
//! Runs the external tree-copy tool (rsync by convention) as a child process
//! and hands the outcome back untouched. The argument contract is:
//!
//! ```text
//! <cmd> <args...> <log_opts...> <filter...> [--link-dest=REF] <source> <destination>
//! ```
//!
//! The adapter is policy-free: it reports the exit status and the captured
//! streams, and the repository engine decides that anything non-zero is fatal
//! for the tick.

mod errors;

pub use errors::ReplicatorError;

use std::path::Path;
use std::process::Command;

/// How to invoke the external replicator.
#[derive(Debug, Clone)]
pub struct ReplicatorSpec {
    /// Program name or path (e.g. `rsync`).
    pub cmd: String,
    /// Leading arguments (e.g. `-a --delete`).
    pub args: Vec<String>,
    /// Filter arguments, passed through verbatim.
    pub filter: Vec<String>,
    /// Logging arguments, passed through verbatim.
    pub log_opts: Vec<String>,
}

/// Exit status and captured streams of one replicator run.
#[derive(Debug)]
pub struct ReplicationOutcome {
    /// Exit code; `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ReplicationOutcome {
    /// True only for a clean zero exit.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit code for reporting; signal deaths collapse to -1.
    pub fn status_code(&self) -> i32 {
        self.status.unwrap_or(-1)
    }
}

/// Replicate `source` into `destination`, hardlinking unchanged files from
/// `link_ref` when one is given.
///
/// Blocks until the child exits. Only failing to launch the child is an
/// error; a non-zero exit is a normal `ReplicationOutcome`.
pub fn replicate(
    spec: &ReplicatorSpec,
    source: &Path,
    destination: &Path,
    link_ref: Option<&Path>,
) -> Result<ReplicationOutcome, ReplicatorError> {
    let mut command = Command::new(&spec.cmd);
    command
        .args(&spec.args)
        .args(&spec.log_opts)
        .args(&spec.filter);
    if let Some(link_ref) = link_ref {
        command.arg(format!("--link-dest={}", link_ref.display()));
    }
    command.arg(source).arg(destination);

    let output = command.output().map_err(|source| ReplicatorError::Spawn {
        command: spec.cmd.clone(),
        source,
    })?;

    Ok(ReplicationOutcome {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> ReplicatorSpec {
        ReplicatorSpec {
            cmd: "sh".to_string(),
            args: vec!["-ec".to_string(), script.to_string()],
            filter: vec![],
            log_opts: vec![],
        }
    }

    #[test]
    fn test_zero_exit_is_success() {
        let outcome = replicate(&sh("exit 0"), Path::new("/src"), Path::new("/dst"), None).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.status_code(), 0);
    }

    #[test]
    fn test_nonzero_exit_is_reported_not_raised() {
        let outcome =
            replicate(&sh("exit 23"), Path::new("/src"), Path::new("/dst"), None).unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.status_code(), 23);
    }

    #[test]
    fn test_streams_are_captured() {
        let outcome = replicate(
            &sh("echo copied; echo oops >&2"),
            Path::new("/src"),
            Path::new("/dst"),
            None,
        )
        .unwrap();
        assert_eq!(outcome.stdout, "copied\n");
        assert_eq!(outcome.stderr, "oops\n");
    }

    #[test]
    fn test_argument_order() {
        // `echo` prints its argv, which pins the contract down exactly.
        let spec = ReplicatorSpec {
            cmd: "echo".to_string(),
            args: vec!["-a".to_string()],
            filter: vec!["--filter=. rules".to_string()],
            log_opts: vec!["--log-file=/tmp/r.log".to_string()],
        };
        let outcome = replicate(
            &spec,
            Path::new("/src"),
            Path::new("/dst"),
            Some(Path::new("/prev/data")),
        )
        .unwrap();
        assert_eq!(
            outcome.stdout,
            "-a --log-file=/tmp/r.log --filter=. rules --link-dest=/prev/data /src /dst\n"
        );
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let spec = ReplicatorSpec {
            cmd: "linkvault-test-no-such-binary".to_string(),
            args: vec![],
            filter: vec![],
            log_opts: vec![],
        };
        let err = replicate(&spec, &PathBuf::from("/src"), &PathBuf::from("/dst"), None)
            .unwrap_err();
        assert!(matches!(err, ReplicatorError::Spawn { .. }));
    }
}
