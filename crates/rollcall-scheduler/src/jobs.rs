//! Periodic jobs that ride on the tick: backup and holiday sync.
//!
//! Each job owns a cron schedule matched against effective time. The scanner
//! spawns matching jobs on their own task so they never hold up reminders.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use rollcall_core::error::Result;
use rollcall_core::traits::Directory;
use rollcall_core::types::Moment;
use serde::Serialize;

use crate::cron::CronSchedule;
use crate::holiday::HolidayClient;
use crate::persistence::SqliteDirectory;

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &str;

    fn schedule(&self) -> &CronSchedule;

    /// Run once. Returns a one-line summary for the log.
    async fn run(&self, now: Moment) -> Result<String>;
}

/// Job name, schedule and next effective run, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub next_run: Option<NaiveDateTime>,
}

pub fn job_status(job: &dyn PeriodicJob, now: Moment) -> JobStatus {
    JobStatus {
        name: job.name().to_string(),
        schedule: job.schedule().expression().to_string(),
        next_run: job.schedule().next_after(now.date.and_time(now.time)),
    }
}

/// Spawn `job` on its own task and log the outcome.
pub fn spawn_job(job: Arc<dyn PeriodicJob>, now: Moment) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("⚙️ Job '{}' started ({})", job.name(), now.hhmm());
        match job.run(now).await {
            Ok(summary) => tracing::info!("✅ Job '{}': {}", job.name(), summary),
            Err(e) => tracing::error!("❌ Job '{}' failed: {e}", job.name()),
        }
    })
}

// ─── Backup ─────────────────────────────────────────────────

pub struct BackupJob {
    directory: Arc<SqliteDirectory>,
    backup_dir: PathBuf,
    keep_days: u32,
    schedule: CronSchedule,
}

impl BackupJob {
    pub fn new(directory: Arc<SqliteDirectory>, backup_dir: PathBuf, keep_days: u32, schedule: CronSchedule) -> Self {
        Self { directory, backup_dir, keep_days, schedule }
    }
}

#[async_trait]
impl PeriodicJob for BackupJob {
    fn name(&self) -> &str {
        "backup"
    }

    fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    async fn run(&self, now: Moment) -> Result<String> {
        let path = self.directory.backup_to(&self.backup_dir, now.date)?;
        let pruned = SqliteDirectory::prune_backups(&self.backup_dir, self.keep_days, now.date)?;
        Ok(format!("wrote {}, pruned {pruned} old backup(s)", path.display()))
    }
}

// ─── Holiday sync ───────────────────────────────────────────

pub struct HolidaySyncJob {
    directory: Arc<dyn Directory>,
    client: HolidayClient,
    schedule: CronSchedule,
}

impl HolidaySyncJob {
    pub fn new(directory: Arc<dyn Directory>, client: HolidayClient, schedule: CronSchedule) -> Self {
        Self { directory, client, schedule }
    }
}

#[async_trait]
impl PeriodicJob for HolidaySyncJob {
    fn name(&self) -> &str {
        "holiday-sync"
    }

    fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    async fn run(&self, now: Moment) -> Result<String> {
        let n = self.client.sync(self.directory.as_ref(), now.date.year()).await?;
        Ok(format!("{n} national holiday(s) stored"))
    }
}
