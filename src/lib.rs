//! linkvault - a scheduled, hardlink-based snapshot backup engine
//!
//! linkvault evaluates cron schedules per repository, produces time-stamped
//! snapshot directories through an external hardlink-capable replicator
//! (rsync `--link-dest` by convention), and retires expired snapshots while
//! keeping shared data alive by collapsing the symlink topology.

pub mod cli;
pub mod config;
pub mod fsops;
pub mod manager;
pub mod observability;
pub mod replicator;
pub mod repository;
pub mod schedule;
