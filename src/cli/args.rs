//! CLI argument definitions using clap
//!
//! Commands:
//! - linkvault run --config <path>
//! - linkvault once --config <path>
//! - linkvault status --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// linkvault - a scheduled, hardlink-based snapshot backup engine
#[derive(Parser, Debug)]
#[command(name = "linkvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler loop until interrupted
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./linkvault.json")]
        config: PathBuf,
    },

    /// Evaluate schedules and retention once, then exit
    Once {
        /// Path to configuration file
        #[arg(long, default_value = "./linkvault.json")]
        config: PathBuf,
    },

    /// Print the snapshot index of every repository
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./linkvault.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
