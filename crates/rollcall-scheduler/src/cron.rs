//! Lightweight cron expressions for the periodic jobs.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Fields: *, */N, N, A-B, comma lists. Day of week uses 0 = Sunday.
//! Example: "0 2 * * *" = every day at 02:00
//!
//! Matching is done against effective (possibly simulated) time, so jobs
//! follow the same clock as the reminders.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use rollcall_core::error::{Result, RollcallError};

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(RollcallError::Config(format!(
                "invalid cron expression '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }
        let field = |idx: usize, min: u32, max: u32| {
            parse_field(parts[idx], min, max).ok_or_else(|| {
                RollcallError::Config(format!(
                    "invalid cron field '{}' in '{expression}'",
                    parts[idx]
                ))
            })
        };
        Ok(Self {
            expression: expression.to_string(),
            minutes: field(0, 0, 59)?,
            hours: field(1, 0, 23)?,
            days_of_month: field(2, 1, 31)?,
            months: field(3, 1, 12)?,
            days_of_week: field(4, 0, 6)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the time-of-day fields match. Used by the tick, which sees
    /// one effective minute at a time.
    pub fn matches_time(&self, time: NaiveTime) -> bool {
        self.minutes.contains(&time.minute()) && self.hours.contains(&time.hour())
    }

    /// Whether every field matches `at`.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.matches_time(at.time())
            && self.days_of_month.contains(&at.day())
            && self.months.contains(&at.month())
            && self.days_of_week.contains(&at.weekday().num_days_from_sunday())
    }

    /// Next matching minute strictly after `after`, searching up to 8 days ahead.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut candidate = after + Duration::minutes(1);
        candidate = candidate
            .with_second(0)
            .and_then(|c| c.with_nanosecond(0))
            .unwrap_or(candidate);

        for _ in 0..(8 * 24 * 60) {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

/// Parse a single cron field into a list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N: every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    let mut values = Vec::new();
    for part in field.split(',') {
        let part = part.trim();
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || lo < min || hi > max {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = part.parse().ok()?;
            if n < min || n > max {
                return None;
            }
            values.push(n);
        }
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_daily_match() {
        let s = CronSchedule::parse("0 2 * * *").unwrap();
        assert!(s.matches_time(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(!s.matches_time(NaiveTime::from_hms_opt(2, 1, 0).unwrap()));
        assert!(!s.matches_time(NaiveTime::from_hms_opt(14, 0, 0).unwrap()));
    }

    #[test]
    fn test_next_after_specific_time() {
        let s = CronSchedule::parse("0 3 * * *").unwrap();
        let next = s.next_after(at(2026, 2, 22, 7, 0)).unwrap();
        assert_eq!(next, at(2026, 2, 23, 3, 0));
    }

    #[test]
    fn test_every_15_minutes() {
        let s = CronSchedule::parse("*/15 * * * *").unwrap();
        let next = s.next_after(at(2026, 2, 22, 10, 2)).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_weekday_range() {
        // 2026-02-21 is a Saturday
        let s = CronSchedule::parse("30 8 * * 1-5").unwrap();
        let next = s.next_after(at(2026, 2, 20, 9, 0)).unwrap();
        assert_eq!(next, at(2026, 2, 23, 8, 30));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronSchedule::parse("bad").is_err());
        assert!(CronSchedule::parse("61 * * * *").is_err());
        assert!(CronSchedule::parse("*/0 * * * *").is_err());
        assert!(CronSchedule::parse("0 5-2 * * *").is_err());
    }
}
