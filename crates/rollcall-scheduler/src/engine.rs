//! Tick scanner: the once-per-effective-minute decision loop.
//!
//! Each tick decides which recipients are due for an initial reminder and
//! hands them to the escalation engine. It also drives the daily reset and
//! the periodic jobs, which match against the same effective clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rollcall_core::config::ScannerConfig;
use rollcall_core::error::Result;
use rollcall_core::traits::{Clock, Directory};
use rollcall_core::types::{Checkpoint, Moment, Recipient, weekday_number};
use serde::Serialize;

use crate::cron::CronSchedule;
use crate::escalation::{BeginOutcome, EscalationEngine};
use crate::jobs::{JobStatus, PeriodicJob, job_status, spawn_job};
use crate::recap;

/// Why a tick did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SkipReason {
    /// Dispatch gateway not connected; the scan is retried on the next poll.
    /// The daily reset and jobs still run.
    GatewayNotReady,
    /// Same effective minute as the previous tick.
    SameMinute,
    Holiday(String),
    /// Directory read failed; the next poll retries the same minute.
    DirectoryError(String),
}

/// What one tick did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub time: String,
    pub skipped: Option<SkipReason>,
    pub daily_reset: bool,
    pub jobs: Vec<String>,
    pub started: Vec<(String, Checkpoint)>,
    pub recaps: Vec<String>,
    pub failures: usize,
}

pub struct TickScanner {
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    escalation: Arc<EscalationEngine>,
    config: ScannerConfig,
    daily_reset: CronSchedule,
    jobs: Vec<Arc<dyn PeriodicJob>>,
    /// Last minute the reminder scan ran.
    last_checked: Mutex<Option<String>>,
    /// Last minute the daily reset and jobs were matched.
    last_maintenance: Mutex<Option<String>>,
}

impl TickScanner {
    pub fn new(
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
        escalation: Arc<EscalationEngine>,
        config: ScannerConfig,
        daily_reset: CronSchedule,
    ) -> Self {
        Self {
            directory,
            clock,
            escalation,
            config,
            daily_reset,
            jobs: Vec::new(),
            last_checked: Mutex::new(None),
            last_maintenance: Mutex::new(None),
        }
    }

    pub fn with_job(mut self, job: Arc<dyn PeriodicJob>) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn escalation(&self) -> &Arc<EscalationEngine> {
        &self.escalation
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn job_statuses(&self) -> Vec<JobStatus> {
        let now = self.clock.now();
        self.jobs.iter().map(|j| job_status(j.as_ref(), now)).collect()
    }

    /// Run one scan. Never fails: problems are logged and reported.
    ///
    /// The daily reset and periodic jobs run once per effective minute whether
    /// or not the gateway is connected. Only the reminder scan waits for it.
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport {
            time: now.hhmm(),
            ..Default::default()
        };

        if Self::claim_minute(&self.last_maintenance, &report.time) {
            if self.daily_reset.matches_time(now.time) {
                self.reset_day();
                report.daily_reset = true;
            }
            for job in &self.jobs {
                if job.schedule().matches_time(now.time) {
                    spawn_job(Arc::clone(job), now);
                    report.jobs.push(job.name().to_string());
                }
            }
        }

        if !self.escalation.gateway().is_ready() {
            tracing::debug!("⏸️ Gateway not ready, skipping {}", report.time);
            report.skipped = Some(SkipReason::GatewayNotReady);
            return report;
        }

        if !Self::claim_minute(&self.last_checked, &report.time) {
            report.skipped = Some(SkipReason::SameMinute);
            return report;
        }

        match self.directory.holiday(now.date) {
            Ok(Some(h)) => {
                tracing::info!("🏖️ {} is a holiday ({}), no reminders", now.date, h.name);
                report.skipped = Some(SkipReason::Holiday(h.name));
                return report;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("❌ Holiday lookup failed, skipping tick: {e}");
                self.release_minute(&report.time);
                report.skipped = Some(SkipReason::DirectoryError(e.to_string()));
                return report;
            }
        }

        let recipients = match self.directory.active_recipients() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("❌ Loading recipients failed, skipping tick: {e}");
                self.release_minute(&report.time);
                report.skipped = Some(SkipReason::DirectoryError(e.to_string()));
                return report;
            }
        };
        if recipients.is_empty() {
            return report;
        }
        tracing::debug!(
            "🔍 Scan {} {} (day {}), {} recipient(s)",
            now.date,
            report.time,
            weekday_number(now.weekday),
            recipients.len()
        );

        for recipient in &recipients {
            if let Err(e) = self.scan_recipient(recipient, &now, &mut report).await {
                report.failures += 1;
                tracing::warn!("⚠️ Scan failed for {}: {e}", recipient.address);
            }
        }
        report
    }

    /// Record `time` as handled. False when it already was.
    fn claim_minute(slot: &Mutex<Option<String>>, time: &str) -> bool {
        let mut last = slot.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(time) {
            return false;
        }
        *last = Some(time.to_string());
        true
    }

    /// Let the next poll retry the scan for `time`.
    fn release_minute(&self, time: &str) {
        let mut last = self.last_checked.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(time) {
            *last = None;
        }
    }

    async fn scan_recipient(&self, recipient: &Recipient, now: &Moment, report: &mut TickReport) -> Result<()> {
        if self.config.service_address.as_deref() == Some(recipient.address.as_str()) {
            return Ok(());
        }
        if !recipient.works_on(now.weekday) {
            return Ok(());
        }
        let leaves = self.directory.active_leaves(&recipient.address, now.date)?;
        if let Some(leave) = leaves.first() {
            tracing::debug!("⏭️ {} on leave ({})", recipient.address, leave.reason);
            return Ok(());
        }

        for checkpoint in Checkpoint::ALL {
            let due = self
                .directory
                .effective_checkpoint_time(recipient, checkpoint, now.weekday);
            if due != now.time {
                continue;
            }
            match self.escalation.begin(recipient, checkpoint).await {
                Ok(BeginOutcome::Started { .. }) => {
                    report.started.push((recipient.address.clone(), checkpoint));
                }
                Ok(BeginOutcome::AlreadyAcknowledged) => {
                    if checkpoint == Checkpoint::Evening && self.recap_due(now) {
                        if self.send_recap(recipient, now).await {
                            report.recaps.push(recipient.address.clone());
                        } else {
                            report.failures += 1;
                        }
                    }
                }
                Ok(BeginOutcome::AlreadyActive) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!("⚠️ {} reminder for {} failed: {e}", checkpoint, recipient.address);
                }
            }
        }
        Ok(())
    }

    fn recap_due(&self, now: &Moment) -> bool {
        self.config.weekly_recap && weekday_number(now.weekday) == self.config.recap_weekday
    }

    /// Returns whether the recap went out.
    async fn send_recap(&self, recipient: &Recipient, now: &Moment) -> bool {
        let summary = match recap::summarize(self.directory.as_ref(), recipient, now.date) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("⚠️ Weekly recap for {} failed: {e}", recipient.address);
                return false;
            }
        };
        let body = self.escalation.formatter().weekly_recap(&summary);
        match self.escalation.deliver(&recipient.address, &body).await {
            Ok(()) => {
                tracing::info!(
                    "📊 Weekly recap sent to {} ({}+{}/{})",
                    recipient.address,
                    summary.morning,
                    summary.evening,
                    summary.expected_days * 2
                );
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ Weekly recap to {} failed: {e}", recipient.address);
                false
            }
        }
    }

    /// Midnight reset: drop per-day bookkeeping and abandon every chain.
    pub fn reset_day(&self) {
        match self.directory.purge_stale() {
            Ok(n) => tracing::info!("🧹 Daily reset: purged {} bookkeeping row(s)", n),
            Err(e) => tracing::warn!("⚠️ Daily purge failed: {e}"),
        }
        self.escalation.clear_all();
    }
}

/// Run the scan loop forever, polling at `poll`.
pub async fn spawn_scheduler(scanner: Arc<TickScanner>, poll: Duration) {
    tracing::info!("⏰ Scheduler started (check every {:?})", poll);

    let mut interval = tokio::time::interval(poll);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let report = scanner.tick().await;
        if !report.started.is_empty() || report.failures > 0 {
            tracing::info!(
                "📣 {} — started {} chain(s), {} failure(s)",
                report.time,
                report.started.len(),
                report.failures
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::Formatter;
    use crate::persistence::SqliteDirectory;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use rollcall_channels::memory::MemoryGateway;
    use rollcall_core::config::{EscalationConfig, ScheduleConfig};
    use rollcall_core::error::RollcallError;
    use rollcall_core::types::{AckMethod, Acknowledgment, Holiday, Leave, Role};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Harness {
        scanner: TickScanner,
        gateway: Arc<MemoryGateway>,
        directory: Arc<SqliteDirectory>,
        clock: Arc<ManualClock>,
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn harness(date: &str, time: &str, scanner_config: ScannerConfig) -> Harness {
        let directory = Arc::new(SqliteDirectory::open_in_memory().unwrap());
        let schedule = ScheduleConfig::default();
        for (addr, name) in [("62811", "Rina"), ("62822", "Budi"), ("62800", "Bot")] {
            directory
                .register_recipient(&schedule.new_recipient(addr, name, Role::Standard))
                .unwrap();
        }
        let gateway = Arc::new(MemoryGateway::new());
        let clock = Arc::new(ManualClock::new(d(date), t(time)));
        let escalation = Arc::new(EscalationEngine::new(
            directory.clone(),
            gateway.clone(),
            clock.clone(),
            Formatter::default(),
            &EscalationConfig::default(),
        ));
        let scanner = TickScanner::new(
            directory.clone(),
            clock.clone(),
            escalation,
            scanner_config,
            CronSchedule::parse("0 0 * * *").unwrap(),
        );
        Harness { scanner, gateway, directory, clock }
    }

    fn with_service() -> ScannerConfig {
        ScannerConfig {
            service_address: Some("62800".into()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_recipients_get_initial_reminder() {
        let h = harness("2026-02-18", "07:25", with_service());
        let report = h.scanner.tick().await;
        assert_eq!(report.skipped, None);
        assert_eq!(report.started.len(), 2);
        assert!(h.gateway.sent_to("62800").is_empty());
        assert!(h.scanner.escalation().is_active("62811", Checkpoint::Morning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_is_idempotent_within_a_minute() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.scanner.tick().await;
        let second = h.scanner.tick().await;
        assert_eq!(second.skipped, Some(SkipReason::SameMinute));
        assert_eq!(h.gateway.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_gateway_retries_same_minute() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.gateway.set_ready(false);
        let report = h.scanner.tick().await;
        assert_eq!(report.skipped, Some(SkipReason::GatewayNotReady));
        h.gateway.set_ready(true);
        let report = h.scanner.tick().await;
        assert_eq!(report.started.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_minute_sends_nothing() {
        let h = harness("2026-02-18", "07:24", with_service());
        let report = h.scanner.tick().await;
        assert!(report.started.is_empty());
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_holiday_blocks_everyone() {
        let h = harness("2026-02-17", "07:25", with_service());
        h.directory.add_holiday(d("2026-02-17"), "Lunar New Year", None).unwrap();
        let report = h.scanner.tick().await;
        assert_eq!(report.skipped, Some(SkipReason::Holiday("Lunar New Year".into())));
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_blocks_only_that_recipient() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.directory
            .add_leave("62811", d("2026-02-17"), d("2026-02-18"), "sick")
            .unwrap();
        let report = h.scanner.tick().await;
        assert_eq!(report.started, vec![("62822".to_string(), Checkpoint::Morning)]);
        assert!(h.gateway.sent_to("62811").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_weekend_is_skipped() {
        let h = harness("2026-02-21", "07:25", with_service());
        let report = h.scanner.tick().await;
        assert!(report.started.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledged_checkpoint_not_resent() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.directory
            .record_acknowledgment("62811", d("2026-02-18"), Checkpoint::Morning, AckMethod::SelfReported, t("07:10"))
            .unwrap();
        let report = h.scanner.tick().await;
        assert_eq!(report.started, vec![("62822".to_string(), Checkpoint::Morning)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_friday_override() {
        let h = harness("2026-02-20", "16:05", with_service());
        assert!(h.scanner.tick().await.started.is_empty());
        h.clock.set_time(t("16:35"));
        assert_eq!(h.scanner.tick().await.started.len(), 2);

        h.clock.set(d("2026-02-19"), t("16:05"));
        let report = h.scanner.tick().await;
        assert_eq!(report.started.len(), 2);
        assert!(report.started.iter().all(|(_, cp)| *cp == Checkpoint::Evening));
    }

    #[tokio::test(start_paused = true)]
    async fn test_followups_flow_from_tick() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.directory.set_max_followups("62811", 2).unwrap();
        h.scanner.tick().await;
        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        let rina = h.gateway.sent_to("62811");
        assert_eq!(rina.len(), 2);
        assert!(rina[1].body.contains("1/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_weekly_recap_on_acknowledged_friday_evening() {
        let h = harness("2026-02-20", "16:35", with_service());
        for day in ["2026-02-16", "2026-02-17", "2026-02-18", "2026-02-19", "2026-02-20"] {
            for cp in Checkpoint::ALL {
                h.directory
                    .record_acknowledgment("62811", d(day), cp, AckMethod::SelfReported, t("08:00"))
                    .unwrap();
            }
        }
        let report = h.scanner.tick().await;
        assert_eq!(report.recaps, vec!["62811".to_string()]);
        let rina = h.gateway.sent_to("62811");
        assert_eq!(rina.len(), 1);
        assert!(rina[0].body.contains("WEEKLY RECAP"));
        assert!(rina[0].body.contains("100%"));
        // Budi has not acknowledged and gets a reminder instead.
        assert!(report.started.contains(&("62822".to_string(), Checkpoint::Evening)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_midnight_reset_clears_chains() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.scanner.tick().await;
        assert_eq!(h.scanner.escalation().active_count(), 2);
        h.clock.set(d("2026-02-19"), t("00:00"));
        let report = h.scanner.tick().await;
        assert!(report.daily_reset);
        assert_eq!(h.scanner.escalation().active_count(), 0);
    }

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        schedule: CronSchedule,
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }
        fn schedule(&self) -> &CronSchedule {
            &self.schedule
        }
        async fn run(&self, _now: Moment) -> Result<String> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok("counted".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_at_their_minute_even_on_holidays() {
        let runs = Arc::new(AtomicUsize::new(0));
        let h = harness("2026-02-17", "02:00", with_service());
        h.directory.add_holiday(d("2026-02-17"), "Lunar New Year", None).unwrap();
        let scanner = h.scanner.with_job(Arc::new(CountingJob {
            runs: runs.clone(),
            schedule: CronSchedule::parse("0 2 * * *").unwrap(),
        }));

        let report = scanner.tick().await;
        assert_eq!(report.jobs, vec!["counting".to_string()]);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        h.clock.set_time(t("02:01"));
        assert!(scanner.tick().await.jobs.is_empty());
        assert_eq!(scanner.job_statuses()[0].schedule, "0 2 * * *");
    }

    #[tokio::test(start_paused = true)]
    async fn test_midnight_reset_runs_while_gateway_down() {
        let runs = Arc::new(AtomicUsize::new(0));
        let h = harness("2026-02-18", "16:05", with_service());
        let scanner = h.scanner.with_job(Arc::new(CountingJob {
            runs: runs.clone(),
            schedule: CronSchedule::parse("0 2 * * *").unwrap(),
        }));
        scanner.tick().await;
        assert_eq!(scanner.escalation().active_count(), 2);

        h.gateway.set_ready(false);
        h.clock.set(d("2026-02-19"), t("00:00"));
        let report = scanner.tick().await;
        assert_eq!(report.skipped, Some(SkipReason::GatewayNotReady));
        assert!(report.daily_reset);
        assert_eq!(scanner.escalation().active_count(), 0);

        // Polling again in the same minute does not reset twice.
        assert!(!scanner.tick().await.daily_reset);

        h.clock.set_time(t("02:00"));
        let report = scanner.tick().await;
        assert_eq!(report.jobs, vec!["counting".to_string()]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        h.gateway.set_ready(true);
        h.clock.set_time(t("02:01"));
        let report = scanner.tick().await;
        assert_eq!(report.skipped, None);
        assert!(!report.daily_reset);
        assert_eq!(scanner.escalation().active_count(), 0);
        assert_eq!(h.gateway.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_recap_send_times_out() {
        let h = harness("2026-02-20", "16:35", with_service());
        h.directory
            .record_acknowledgment("62811", d("2026-02-20"), Checkpoint::Evening, AckMethod::SelfReported, t("16:30"))
            .unwrap();
        h.gateway.stall_address("62811");

        let report = tokio::time::timeout(Duration::from_secs(3600), h.scanner.tick())
            .await
            .expect("tick must finish once the send times out");
        assert!(report.recaps.is_empty());
        assert_eq!(report.failures, 1);
        assert!(report.started.contains(&("62822".to_string(), Checkpoint::Evening)));
        assert_eq!(h.gateway.sent_to("62822").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_initial_send_does_not_hold_up_others() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.gateway.stall_address("62811");

        let report = tokio::time::timeout(Duration::from_secs(60), h.scanner.tick())
            .await
            .expect("tick must finish once the send times out");
        assert_eq!(report.started.len(), 2);
        assert!(h.gateway.sent_to("62811").is_empty());
        assert_eq!(h.gateway.sent_to("62822").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_recipient_does_not_abort_scan() {
        let h = harness("2026-02-18", "07:25", with_service());
        h.gateway.fail_address("62811");
        let report = h.scanner.tick().await;
        assert_eq!(report.started.len(), 2);
        assert!(h.gateway.sent_to("62811").is_empty());
        assert_eq!(h.gateway.sent_to("62822").len(), 1);
        // The chain still runs, so the first follow-up retries delivery.
        assert!(h.scanner.escalation().is_active("62811", Checkpoint::Morning));
    }

    /// Directory whose recipient listing can be made to fail.
    struct FlakyDirectory {
        inner: Arc<SqliteDirectory>,
        failing: AtomicBool,
    }

    impl Directory for FlakyDirectory {
        fn active_recipients(&self) -> Result<Vec<Recipient>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RollcallError::Directory("database is locked".into()));
            }
            self.inner.active_recipients()
        }
        fn recipient(&self, address: &str) -> Result<Option<Recipient>> {
            self.inner.recipient(address)
        }
        fn acknowledgment(&self, address: &str, date: NaiveDate, checkpoint: Checkpoint) -> Result<Option<Acknowledgment>> {
            self.inner.acknowledgment(address, date, checkpoint)
        }
        fn acknowledgments_between(&self, address: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Acknowledgment>> {
            self.inner.acknowledgments_between(address, start, end)
        }
        fn record_acknowledgment(
            &self,
            address: &str,
            date: NaiveDate,
            checkpoint: Checkpoint,
            method: AckMethod,
            at: NaiveTime,
        ) -> Result<Acknowledgment> {
            self.inner.record_acknowledgment(address, date, checkpoint, method, at)
        }
        fn holiday(&self, date: NaiveDate) -> Result<Option<Holiday>> {
            self.inner.holiday(date)
        }
        fn active_leaves(&self, address: &str, date: NaiveDate) -> Result<Vec<Leave>> {
            self.inner.active_leaves(address, date)
        }
        fn purge_stale(&self) -> Result<usize> {
            self.inner.purge_stale()
        }
        fn sync_national_holidays(&self, holidays: &[Holiday]) -> Result<usize> {
            self.inner.sync_national_holidays(holidays)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_failure_skips_and_retries_same_minute() {
        let h = harness("2026-02-18", "07:25", with_service());
        let flaky = Arc::new(FlakyDirectory {
            inner: h.directory.clone(),
            failing: AtomicBool::new(true),
        });
        let escalation = Arc::new(EscalationEngine::new(
            flaky.clone(),
            h.gateway.clone(),
            h.clock.clone(),
            Formatter::default(),
            &EscalationConfig::default(),
        ));
        let scanner = TickScanner::new(
            flaky.clone(),
            h.clock.clone(),
            escalation,
            with_service(),
            CronSchedule::parse("0 0 * * *").unwrap(),
        );

        let report = scanner.tick().await;
        assert!(matches!(report.skipped, Some(SkipReason::DirectoryError(_))));
        assert!(h.gateway.sent().is_empty());

        flaky.failing.store(false, Ordering::SeqCst);
        let report = scanner.tick().await;
        assert_eq!(report.skipped, None);
        assert_eq!(report.started.len(), 2);
    }
}
