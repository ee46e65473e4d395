//! # Rollcall Scheduler
//!
//! Daily checkpoint reminders with escalating follow-ups.
//!
//! ## Architecture
//! ```text
//! spawn_scheduler (tokio interval, poll ≤ 1 effective minute)
//!   └── TickScanner::tick
//!         ├── daily reset 00:00 → purge bookkeeping, clear all chains
//!         ├── PeriodicJob: backup 02:00, holiday sync 03:00 (own tasks)
//!         ├── holiday? → skip the whole tick
//!         └── per recipient: work day, leave, effective time, acknowledged?
//!               └── EscalationEngine::begin
//!                     ├── initial reminder (Formatter → DispatchGateway)
//!                     └── one-shot timers at 5, 8, 13, 21 … minutes
//!                           polite (1–2) → direct (3–5) → urgent (6+)
//! ```
//!
//! In-flight chains live in memory only. After a restart the next tick
//! rebuilds what it needs from persisted acknowledgments.

pub mod clock;
pub mod cron;
pub mod engine;
pub mod escalation;
pub mod holiday;
pub mod jobs;
pub mod notify;
pub mod persistence;
pub mod recap;
pub mod timer;

pub use clock::{ClockOptions, ManualClock, SimulatedClock, SystemClock, poll_interval};
pub use cron::CronSchedule;
pub use engine::{SkipReason, TickReport, TickScanner, spawn_scheduler};
pub use escalation::{BeginOutcome, ChainStatus, EscalationEngine};
pub use holiday::HolidayClient;
pub use jobs::{BackupJob, HolidaySyncJob, JobStatus, PeriodicJob};
pub use notify::{Formatter, Progress, Tier};
pub use persistence::SqliteDirectory;
pub use timer::{TimerHandle, Timers, TokioTimers};
