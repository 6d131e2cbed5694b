//! Schedule error types

use thiserror::Error;

/// Errors from parsing cron expressions.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression {expression:?}: {source}")]
    InvalidExpression {
        expression: String,
        source: croner::errors::CronError,
    },
}
