//! linkvault CLI entry point
//!
//! main only parses arguments, dispatches, and maps the outcome to an exit
//! code; everything else lives behind the library crate.

use std::process;

use linkvault::cli::{run_command, Cli, CliError};

fn main() {
    let cli = Cli::parse_args();

    if let Err(err) = run_command(cli) {
        // The interrupt path has already logged its own shutdown notice.
        if !matches!(err, CliError::Interrupted) {
            let error_json = serde_json::json!({
                "event": "fatal",
                "severity": "ERROR",
                "message": err.to_string(),
            });
            eprintln!("{}", error_json);
        }
        process::exit(err.exit_code());
    }
}
