//! Clock implementations: wall clock, accelerated/offset simulation, and a
//! manually driven clock for tests.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveTime, Timelike, Weekday};
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::Clock;
use rollcall_core::types::{Moment, parse_hhmm, weekday_from_number};
use tokio::time::Instant;

const SECS_PER_DAY: f64 = 86_400.0;

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// How often the scan loop should poll for a given speed multiplier.
///
/// At real time this is 30 s, so a late wake-up can never skip a whole
/// minute. Under acceleration it shrinks to one poll per effective minute,
/// but never below one second.
pub fn poll_interval(speed: f64) -> Duration {
    let speed = if speed.is_finite() && speed >= 1.0 { speed } else { 1.0 };
    let secs = (60.0 / speed).clamp(1.0, 30.0);
    Duration::from_secs_f64(secs)
}

// ─── System clock ───────────────────────────────────────────

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Moment {
        let now = Local::now();
        Moment {
            date: now.date_naive(),
            time: truncate_to_minute(now.time()),
            weekday: now.weekday(),
        }
    }
}

// ─── Simulated clock ────────────────────────────────────────

/// Raw simulation settings, usually straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct ClockOptions {
    /// Start time `HH:MM`.
    pub time: Option<String>,
    /// Fixed date `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Weekday override, 0 = Sunday.
    pub day: Option<u8>,
    /// Effective seconds per real second.
    pub speed: Option<f64>,
}

impl ClockOptions {
    pub fn is_simulated(&self) -> bool {
        self.time.is_some() || self.date.is_some() || self.day.is_some() || self.speed.is_some()
    }
}

/// Clock that starts at a chosen time and runs `speed` times faster than
/// the wall clock, wrapping at midnight.
#[derive(Debug)]
pub struct SimulatedClock {
    start_secs: f64,
    date: Option<NaiveDate>,
    day: Option<Weekday>,
    speed: f64,
    started: Instant,
}

impl SimulatedClock {
    /// Validate the options and start the clock. Any invalid value is a
    /// [`RollcallError::Clock`].
    pub fn new(opts: ClockOptions) -> Result<Self> {
        let start = match &opts.time {
            Some(raw) => parse_hhmm(raw).ok_or_else(|| {
                RollcallError::Clock(format!("invalid time '{raw}', expected HH:MM (00:00-23:59)"))
            })?,
            None => Local::now().time(),
        };
        let date = opts
            .date
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    RollcallError::Clock(format!("invalid date '{raw}', expected YYYY-MM-DD"))
                })
            })
            .transpose()?;
        let day = opts
            .day
            .map(|n| {
                weekday_from_number(n).ok_or_else(|| {
                    RollcallError::Clock(format!("invalid day {n}, expected 0 (Sunday) to 6"))
                })
            })
            .transpose()?;
        let speed = opts.speed.unwrap_or(1.0);
        if !speed.is_finite() || speed < 1.0 {
            return Err(RollcallError::Clock(format!(
                "invalid speed {speed}, must be at least 1"
            )));
        }

        Ok(Self {
            start_secs: start.num_seconds_from_midnight() as f64,
            date,
            day,
            speed,
            started: Instant::now(),
        })
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Moment {
        let elapsed = self.started.elapsed().as_secs_f64() * self.speed;
        let secs = (self.start_secs + elapsed).rem_euclid(SECS_PER_DAY) as u32;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN);
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        Moment {
            date,
            time: truncate_to_minute(time),
            weekday: self.day.unwrap_or_else(|| date.weekday()),
        }
    }

    fn speed_multiplier(&self) -> f64 {
        self.speed
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

// ─── Manual clock ───────────────────────────────────────────

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Moment>,
    speed: f64,
}

impl ManualClock {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self::with_speed(date, time, 1.0)
    }

    pub fn with_speed(date: NaiveDate, time: NaiveTime, speed: f64) -> Self {
        Self {
            now: Mutex::new(Moment {
                date,
                time: truncate_to_minute(time),
                weekday: date.weekday(),
            }),
            speed,
        }
    }

    /// Convenience constructor: `ManualClock::at("2026-02-20", "07:25")`.
    pub fn at(date: &str, time: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| RollcallError::Clock(format!("invalid date '{date}': {e}")))?;
        let time = parse_hhmm(time)
            .ok_or_else(|| RollcallError::Clock(format!("invalid time '{time}'")))?;
        Ok(Self::new(date, time))
    }

    pub fn set(&self, date: NaiveDate, time: NaiveTime) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = Moment {
            date,
            time: truncate_to_minute(time),
            weekday: date.weekday(),
        };
    }

    pub fn set_time(&self, time: NaiveTime) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        now.time = truncate_to_minute(time);
    }

    /// Move forward, rolling the date over at midnight.
    pub fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        let next = now.date.and_time(now.time) + chrono::Duration::minutes(minutes);
        *now = Moment {
            date: next.date(),
            time: next.time(),
            weekday: next.date().weekday(),
        };
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Moment {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn speed_multiplier(&self) -> f64 {
        self.speed
    }
}
