//! Observability for linkvault
//!
//! One concern: structured logging. Logs are synchronous, one JSON line per
//! event, with deterministic key ordering. There is no global logger; a
//! `Logger` value is handed to the components that need one.

mod logger;

pub use logger::{Logger, Severity};
