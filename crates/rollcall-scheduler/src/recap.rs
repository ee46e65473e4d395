//! Weekly acknowledgment recap.
//!
//! Sent once a week to a recipient whose evening checkpoint is already
//! acknowledged when the evening reminder would have fired. Independent of
//! the escalation engine: a failed recap is logged and forgotten.

use chrono::{Datelike, Duration, NaiveDate};
use rollcall_core::error::Result;
use rollcall_core::traits::Directory;
use rollcall_core::types::{Checkpoint, Recipient};

/// Counts for one recipient from Monday through the recap day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapSummary {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub morning: u32,
    pub evening: u32,
    /// Work days in `start..=end`.
    pub expected_days: u32,
}

impl RecapSummary {
    /// Rounded share of acknowledged checkpoints out of `2 * expected_days`.
    pub fn percentage(&self) -> u32 {
        if self.expected_days == 0 {
            return 0;
        }
        let done = (self.morning + self.evening) as f64;
        let expected = (self.expected_days * 2) as f64;
        ((done / expected) * 100.0).round().min(100.0) as u32
    }

    pub fn status_line(&self) -> &'static str {
        match self.percentage() {
            90.. => "🌟 *Excellent!* You've been very consistent.",
            70..=89 => "👍 *Good job!* Keep it up.",
            _ => "💪 *Keep going!* Aim for more next week.",
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Build the recap for `recipient` covering Monday through `today`.
pub fn summarize(directory: &dyn Directory, recipient: &Recipient, today: NaiveDate) -> Result<RecapSummary> {
    let start = week_start(today);
    let acks = directory.acknowledgments_between(&recipient.address, start, today)?;

    let morning = acks
        .iter()
        .filter(|a| a.checkpoint == Checkpoint::Morning)
        .count() as u32;
    let evening = acks
        .iter()
        .filter(|a| a.checkpoint == Checkpoint::Evening)
        .count() as u32;
    let expected_days = start
        .iter_days()
        .take_while(|d| *d <= today)
        .filter(|d| recipient.works_on(d.weekday()))
        .count() as u32;

    Ok(RecapSummary {
        name: recipient.name.clone(),
        start,
        end: today,
        morning,
        evening,
        expected_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteDirectory;
    use rollcall_core::config::ScheduleConfig;
    use rollcall_core::types::{AckMethod, Role, parse_hhmm};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn summary(morning: u32, evening: u32, expected: u32) -> RecapSummary {
        RecapSummary {
            name: "A".into(),
            start: d("2026-02-16"),
            end: d("2026-02-20"),
            morning,
            evening,
            expected_days: expected,
        }
    }

    #[test]
    fn test_week_start() {
        assert_eq!(week_start(d("2026-02-20")), d("2026-02-16"));
        assert_eq!(week_start(d("2026-02-16")), d("2026-02-16"));
        assert_eq!(week_start(d("2026-02-22")), d("2026-02-16"));
    }

    #[test]
    fn test_percentage_thresholds() {
        assert_eq!(summary(5, 4, 5).percentage(), 90);
        assert!(summary(5, 4, 5).status_line().contains("Excellent"));
        assert_eq!(summary(4, 3, 5).percentage(), 70);
        assert!(summary(4, 3, 5).status_line().contains("Good"));
        assert_eq!(summary(3, 3, 5).percentage(), 60);
        assert!(summary(3, 3, 5).status_line().contains("Keep going"));
        assert_eq!(summary(0, 0, 0).percentage(), 0);
    }

    #[test]
    fn test_summarize_counts_this_week_only() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        let r = ScheduleConfig::default().new_recipient("62811", "Rina", Role::Standard);
        dir.register_recipient(&r).unwrap();
        let at = parse_hhmm("07:30").unwrap();
        for day in ["2026-02-13", "2026-02-16", "2026-02-17", "2026-02-20"] {
            dir.record_acknowledgment("62811", d(day), Checkpoint::Morning, AckMethod::SelfReported, at)
                .unwrap();
        }
        dir.record_acknowledgment("62811", d("2026-02-20"), Checkpoint::Evening, AckMethod::SelfReported, at)
            .unwrap();

        let s = summarize(&dir, &r, d("2026-02-20")).unwrap();
        assert_eq!(s.start, d("2026-02-16"));
        assert_eq!(s.morning, 3);
        assert_eq!(s.evening, 1);
        assert_eq!(s.expected_days, 5);
        assert_eq!(s.percentage(), 40);
    }
}
