//! Schedule evaluation
//!
//! A `Cronjob` wraps a parsed cron expression and answers exactly one
//! question: has the schedule fired between some anchor time and now?
//! The engine treats this as a pure function over naive local wall time.

mod errors;

pub use errors::ScheduleError;

use chrono::NaiveDateTime;
use croner::Cron;

/// A parsed cron schedule.
#[derive(Debug, Clone)]
pub struct Cronjob {
    expression: String,
    cron: Cron,
}

impl Cronjob {
    /// Parse a cron expression (five fields, seconds optional).
    pub fn new(expression: &str) -> Result<Self, ScheduleError> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|source| ScheduleError::InvalidExpression {
                expression: expression.to_string(),
                source,
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    /// The original expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True iff the schedule's next fire time after `anchor` is at or before
    /// `now`. With `include_start` the anchor itself counts as a fire time if
    /// it matches the expression.
    ///
    /// Timestamps are naive local wall time; the cron arithmetic only needs
    /// them to be mutually consistent.
    pub fn has_occurred_since(
        &self,
        anchor: NaiveDateTime,
        include_start: bool,
        now: NaiveDateTime,
    ) -> bool {
        match self
            .cron
            .find_next_occurrence(&anchor.and_utc(), include_start)
        {
            Ok(next) => next <= now.and_utc(),
            // No future occurrence at all: the schedule cannot have fired.
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_rejects_garbage_expression() {
        assert!(Cronjob::new("not a cron line").is_err());
        assert!(Cronjob::new("").is_err());
    }

    #[test]
    fn test_expression_is_kept() {
        let job = Cronjob::new("0 * * * *").unwrap();
        assert_eq!(job.expression(), "0 * * * *");
    }

    #[test]
    fn test_hourly_has_occurred_after_the_hour() {
        let hourly = Cronjob::new("0 * * * *").unwrap();
        let anchor = at(2024, 1, 1, 10, 0, 0);

        // Next fire after 10:00 is 11:00.
        assert!(!hourly.has_occurred_since(anchor, false, at(2024, 1, 1, 10, 30, 0)));
        assert!(hourly.has_occurred_since(anchor, false, at(2024, 1, 1, 11, 0, 0)));
        assert!(hourly.has_occurred_since(anchor, false, at(2024, 1, 1, 12, 15, 0)));
    }

    #[test]
    fn test_include_start_counts_matching_anchor() {
        let hourly = Cronjob::new("0 * * * *").unwrap();
        let on_the_hour = at(2024, 1, 1, 10, 0, 0);

        assert!(hourly.has_occurred_since(on_the_hour, true, on_the_hour));
        assert!(!hourly.has_occurred_since(on_the_hour, false, on_the_hour));
    }

    #[test]
    fn test_daily_across_midnight() {
        let daily = Cronjob::new("0 0 * * *").unwrap();
        let anchor = at(2024, 1, 1, 23, 50, 0);

        assert!(!daily.has_occurred_since(anchor, false, at(2024, 1, 1, 23, 59, 59)));
        assert!(daily.has_occurred_since(anchor, false, at(2024, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn test_anchor_with_odd_seconds() {
        let hourly = Cronjob::new("0 * * * *").unwrap();
        let anchor = at(2024, 1, 1, 10, 59, 31);

        assert!(hourly.has_occurred_since(anchor, false, at(2024, 1, 1, 11, 0, 0)));
        assert!(!hourly.has_occurred_since(anchor, false, at(2024, 1, 1, 10, 59, 59)));
    }
}
