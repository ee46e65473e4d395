//! # Rollcall: checkpoint reminder daemon
//!
//! Sends each recipient a morning and evening reminder and keeps following up
//! on a Fibonacci backoff until they acknowledge.
//!
//! Usage:
//!   rollcall                                  # Run against the wall clock
//!   rollcall --time 07:20 --speed 60          # Simulated day, one minute per second
//!   rollcall --date 2026-02-20 --dry-run      # Simulated Friday, messages only logged

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_channels::{MemoryGateway, WhatsAppGateway};
use rollcall_core::config::RollcallConfig;
use rollcall_core::traits::{Clock, DispatchGateway};
use rollcall_core::types::Role;
use rollcall_scheduler::{
    BackupJob, ClockOptions, CronSchedule, EscalationEngine, Formatter, HolidayClient,
    HolidaySyncJob, PeriodicJob, SimulatedClock, SqliteDirectory, SystemClock, TickScanner,
    poll_interval, spawn_scheduler,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rollcall",
    version,
    about = "⏰ Rollcall — checkpoint reminders with escalating follow-ups"
)]
struct Cli {
    /// Config file (default: ~/.rollcall/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated start time, HH:MM
    #[arg(long)]
    time: Option<String>,

    /// Simulated date, YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,

    /// Simulated weekday, 0 = Sunday
    #[arg(long)]
    day: Option<u8>,

    /// Simulated seconds per real second
    #[arg(long)]
    speed: Option<f64>,

    /// Gateway port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log messages instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

async fn build_gateway(config: &RollcallConfig, dry_run: bool) -> Arc<dyn DispatchGateway> {
    if !dry_run {
        if let Some(wa) = config.channel.whatsapp.as_ref().filter(|c| c.enabled) {
            let gateway = Arc::new(WhatsAppGateway::new(wa.clone()));
            if let Err(e) = gateway.connect().await {
                tracing::error!("❌ WhatsApp connect failed: {e} (reminders paused until reconnected)");
            }
            gateway.clone().spawn_reconnect();
            return gateway;
        }
        tracing::warn!("⚠️ No channel configured, falling back to dry-run");
    }
    Arc::new(MemoryGateway::new().with_echo())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "rollcall=debug,rollcall_scheduler=debug,rollcall_gateway=debug,tower_http=debug"
    } else {
        "rollcall=info,rollcall_scheduler=info,rollcall_channels=info,rollcall_gateway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RollcallConfig::load_from(path)?,
        None => RollcallConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    config.validate().context("invalid configuration")?;

    // Clock
    let opts = ClockOptions {
        time: cli.time.clone(),
        date: cli.date.clone(),
        day: cli.day,
        speed: cli.speed,
    };
    let clock: Arc<dyn Clock> = if opts.is_simulated() {
        Arc::new(SimulatedClock::new(opts).context("invalid simulation options")?)
    } else {
        Arc::new(SystemClock)
    };
    let speed = clock.speed_multiplier();
    if speed > 60.0 {
        tracing::warn!("⚠️ Speed {speed}x: timers shorter than a second may bunch up");
    }
    let start = clock.now();
    tracing::info!(
        "🕐 Clock: {} {} ({}{})",
        start.date,
        start.hhmm(),
        start.weekday,
        if clock.is_simulated() { format!(", simulated {speed}x") } else { String::new() }
    );

    // Storage
    let db_path = expand_path(&config.storage.db_path);
    let directory = Arc::new(SqliteDirectory::open(&db_path)?);
    tracing::info!("💾 Database: {}", db_path.display());

    if let Some(service) = config.scanner.service_address.as_deref() {
        let mut own = config.schedule.new_recipient(service, "Service", Role::Privileged);
        own.active = false;
        directory.register_recipient(&own)?;
    }

    let gateway = build_gateway(&config, cli.dry_run).await;

    let escalation = Arc::new(EscalationEngine::new(
        directory.clone(),
        gateway.clone(),
        clock.clone(),
        Formatter::new(config.templates.clone()),
        &config.escalation,
    ));

    let backup: Arc<dyn PeriodicJob> = Arc::new(BackupJob::new(
        directory.clone(),
        expand_path(&config.storage.backup_dir),
        config.jobs.backup_keep_days,
        CronSchedule::parse(&config.jobs.backup)?,
    ));
    let mut scanner = TickScanner::new(
        directory.clone(),
        clock.clone(),
        escalation.clone(),
        config.scanner.clone(),
        CronSchedule::parse(&config.jobs.cleanup)?,
    )
    .with_job(backup);

    if config.jobs.holiday_sync_enabled {
        let sync: Arc<dyn PeriodicJob> = Arc::new(HolidaySyncJob::new(
            directory.clone(),
            HolidayClient::new(&config.jobs.holiday_api_url),
            CronSchedule::parse(&config.jobs.holiday_sync)?,
        ));
        rollcall_scheduler::jobs::spawn_job(sync.clone(), start);
        scanner = scanner.with_job(sync);
    }
    let scanner = Arc::new(scanner);

    let poll = poll_interval(speed);
    let scheduler = tokio::spawn(spawn_scheduler(scanner.clone(), poll));

    let state = Arc::new(rollcall_gateway::AppState::new(config.clone(), directory, scanner));
    let gateway_config = config.gateway.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = rollcall_gateway::start(&gateway_config, state).await {
            tracing::error!("❌ Gateway server stopped: {e}");
        }
    });

    println!("⏰ Rollcall is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("👋 Shutting down");
    scheduler.abort();
    server.abort();
    let cancelled = escalation.clear_all();
    if cancelled > 0 {
        tracing::info!("🛑 Cancelled {} pending chain(s)", cancelled);
    }
    Ok(())
}
