//! Backup schedule expressions (UTC).
//!
//! Accepted forms: `manual`, `hourly`, `daily HH:MM`, `weekly <mon..sun> HH:MM`.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc, Weekday};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSchedule {
    Manual,
    Hourly,
    Daily { at: NaiveTime },
    Weekly { day: Weekday, at: NaiveTime },
}

impl BackupSchedule {
    pub fn parse(expr: &str) -> Result<Self, DomainError> {
        let lowered = expr.trim().to_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();
        let invalid = || DomainError::ValidationError(format!("invalid schedule '{}'", expr));

        match parts.as_slice() {
            ["manual"] => Ok(BackupSchedule::Manual),
            ["hourly"] => Ok(BackupSchedule::Hourly),
            ["daily", time] => Ok(BackupSchedule::Daily {
                at: parse_time(time).ok_or_else(invalid)?,
            }),
            ["weekly", day, time] => Ok(BackupSchedule::Weekly {
                day: day.parse::<Weekday>().map_err(|_| invalid())?,
                at: parse_time(time).ok_or_else(invalid)?,
            }),
            _ => Err(invalid()),
        }
    }

    /// First fire time strictly after `after`; `None` for manual schedules.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            BackupSchedule::Manual => None,
            BackupSchedule::Hourly => {
                let top = after
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))?;
                Some(top + Duration::hours(1))
            }
            BackupSchedule::Daily { at } => {
                let today = Utc.from_utc_datetime(&after.date_naive().and_time(at));
                if today > after {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            BackupSchedule::Weekly { day, at } => {
                let offset = (i64::from(day.num_days_from_monday())
                    - i64::from(after.weekday().num_days_from_monday()))
                .rem_euclid(7);
                let candidate = Utc.from_utc_datetime(
                    &(after.date_naive() + Duration::days(offset)).and_time(at),
                );
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::days(7))
                }
            }
        }
    }

    /// Whether a fire time falls in `(since, now]`.
    pub fn is_due(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.next_after(since).map(|next| next <= now).unwrap_or(false)
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(BackupSchedule::parse("manual").unwrap(), BackupSchedule::Manual);
        assert_eq!(BackupSchedule::parse(" Hourly ").unwrap(), BackupSchedule::Hourly);
        assert!(matches!(
            BackupSchedule::parse("daily 02:30").unwrap(),
            BackupSchedule::Daily { .. }
        ));
        assert!(matches!(
            BackupSchedule::parse("weekly sun 04:00").unwrap(),
            BackupSchedule::Weekly { day: Weekday::Sun, .. }
        ));
        assert!(BackupSchedule::parse("daily 25:00").is_err());
        assert!(BackupSchedule::parse("weekly someday 04:00").is_err());
        assert!(BackupSchedule::parse("0 2 * * *").is_err());
    }

    #[test]
    fn test_daily_next_after() {
        let schedule = BackupSchedule::parse("daily 02:00").unwrap();
        assert_eq!(
            schedule.next_after(at("2026-03-10T01:00:00Z")),
            Some(at("2026-03-10T02:00:00Z"))
        );
        assert_eq!(
            schedule.next_after(at("2026-03-10T02:00:00Z")),
            Some(at("2026-03-11T02:00:00Z"))
        );
    }

    #[test]
    fn test_weekly_next_after() {
        // 2026-03-10 is a Tuesday.
        let schedule = BackupSchedule::parse("weekly mon 03:00").unwrap();
        assert_eq!(
            schedule.next_after(at("2026-03-10T12:00:00Z")),
            Some(at("2026-03-16T03:00:00Z"))
        );
        let same_day = BackupSchedule::parse("weekly tue 13:00").unwrap();
        assert_eq!(
            same_day.next_after(at("2026-03-10T12:00:00Z")),
            Some(at("2026-03-10T13:00:00Z"))
        );
    }

    #[test]
    fn test_is_due_window() {
        let schedule = BackupSchedule::Hourly;
        assert!(schedule.is_due(at("2026-03-10T01:59:30Z"), at("2026-03-10T02:00:10Z")));
        assert!(!schedule.is_due(at("2026-03-10T02:00:10Z"), at("2026-03-10T02:01:10Z")));
        assert!(!BackupSchedule::Manual.is_due(at("2026-03-10T00:00:00Z"), Utc::now()));
    }
}
