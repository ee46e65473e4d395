//! Domain types shared by the scheduler, the directory and the HTTP gateway.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RollcallError;

/// Default escalation cap when a recipient has none configured.
pub const DEFAULT_MAX_FOLLOWUPS: u8 = 10;
/// Lowest escalation cap a recipient may configure.
pub const MIN_FOLLOWUPS: u8 = 1;
/// Highest escalation cap a recipient may configure.
pub const MAX_FOLLOWUPS: u8 = 10;

/// Clamp a requested escalation cap into `[MIN_FOLLOWUPS, MAX_FOLLOWUPS]`.
pub fn clamp_followups(requested: i64) -> u8 {
    requested.clamp(MIN_FOLLOWUPS as i64, MAX_FOLLOWUPS as i64) as u8
}

/// Parse an `HH:MM` string.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Format a time as `HH:MM`.
pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Weekday number as stored in schedules: 0 = Sunday … 6 = Saturday.
pub fn weekday_number(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

/// Inverse of [`weekday_number`].
pub fn weekday_from_number(n: u8) -> Option<Weekday> {
    match n {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

// ─── Checkpoint ─────────────────────────────────────────────

/// A named daily event that requires acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Checkpoint {
    Morning,
    Evening,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 2] = [Checkpoint::Morning, Checkpoint::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Morning => "morning",
            Checkpoint::Evening => "evening",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Checkpoint {
    type Err = RollcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Checkpoint::Morning),
            "evening" => Ok(Checkpoint::Evening),
            other => Err(RollcallError::InvalidInput(format!(
                "unknown checkpoint '{other}' (expected morning or evening)"
            ))),
        }
    }
}

// ─── Recipient ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Privileged,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Privileged => "privileged",
        }
    }

    pub fn parse(s: &str) -> Role {
        match s {
            "privileged" | "admin" => Role::Privileged,
            _ => Role::Standard,
        }
    }
}

/// Per-weekday reminder time overrides. Values are raw `HH:MM` strings because
/// they come from user-editable storage and may be malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evening: Option<String>,
}

impl DayOverride {
    pub fn get(&self, checkpoint: Checkpoint) -> Option<&str> {
        match checkpoint {
            Checkpoint::Morning => self.morning.as_deref(),
            Checkpoint::Evening => self.evening.as_deref(),
        }
    }
}

/// Someone who receives reminders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Unique address (phone number in international format).
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub morning: NaiveTime,
    pub evening: NaiveTime,
    /// Weekday number (`"0"`..`"6"`, Sunday first) → checkpoint overrides.
    #[serde(default)]
    pub overrides: BTreeMap<String, DayOverride>,
    /// Active weekdays, Sunday = 0.
    pub work_days: Vec<u8>,
    /// Escalation cap: maximum follow-ups after the initial reminder.
    pub max_followups: u8,
    pub active: bool,
}

impl Recipient {
    pub fn default_time(&self, checkpoint: Checkpoint) -> NaiveTime {
        match checkpoint {
            Checkpoint::Morning => self.morning,
            Checkpoint::Evening => self.evening,
        }
    }

    /// Reminder time for `checkpoint` on `day`: a day-specific override wins over
    /// the default. A malformed override is logged and ignored.
    pub fn effective_time(&self, checkpoint: Checkpoint, day: Weekday) -> NaiveTime {
        let key = weekday_number(day).to_string();
        if let Some(raw) = self.overrides.get(&key).and_then(|o| o.get(checkpoint)) {
            match parse_hhmm(raw) {
                Some(t) => return t,
                None => tracing::warn!(
                    "⚠️ Invalid {} override '{}' for {} on day {}, using default",
                    checkpoint,
                    raw,
                    self.address,
                    key
                ),
            }
        }
        self.default_time(checkpoint)
    }

    pub fn works_on(&self, day: Weekday) -> bool {
        self.work_days.contains(&weekday_number(day))
    }

    /// Escalation cap, clamped to the allowed range.
    pub fn cap(&self) -> u8 {
        clamp_followups(self.max_followups as i64)
    }
}

// ─── Acknowledgment ─────────────────────────────────────────

/// How an acknowledgment was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMethod {
    /// The recipient confirmed.
    SelfReported,
    /// An operator confirmed on the recipient's behalf.
    OperatorForced,
}

impl AckMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMethod::SelfReported => "self",
            AckMethod::OperatorForced => "operator",
        }
    }

    pub fn parse(s: &str) -> AckMethod {
        match s {
            "operator" | "operator_forced" | "auto" => AckMethod::OperatorForced,
            _ => AckMethod::SelfReported,
        }
    }
}

/// At most one per (address, date, checkpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub address: String,
    pub date: NaiveDate,
    pub checkpoint: Checkpoint,
    pub acknowledged_at: NaiveTime,
    pub method: AckMethod,
}

// ─── Exemptions ─────────────────────────────────────────────

/// Calendar-wide day off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    /// National holidays come from the calendar sync; local ones are added by operators.
    pub national: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Active,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Active => "active",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

/// Recipient-scoped exemption over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leave {
    pub id: i64,
    pub address: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
}

impl Leave {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.status == LeaveStatus::Active && self.start <= date && date <= self.end
    }
}

// ─── Time ───────────────────────────────────────────────────

/// A point in effective time at minute granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub weekday: Weekday,
}

impl Moment {
    pub fn hhmm(&self) -> String {
        format_hhmm(self.time)
    }
}
