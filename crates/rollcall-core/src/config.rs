//! Rollcall configuration system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, RollcallError};
use crate::types::{
    DEFAULT_MAX_FOLLOWUPS, DayOverride, MAX_FOLLOWUPS, MIN_FOLLOWUPS, Recipient, Role,
    clamp_followups, parse_hhmm,
};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RollcallConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub templates: MessageTemplates,
}

impl RollcallConfig {
    /// Load config from `ROLLCALL_CONFIG` or the default path (~/.rollcall/config.toml).
    pub fn load() -> Result<Self> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RollcallError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RollcallError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RollcallError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Rollcall home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rollcall")
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (label, raw) in [
            ("schedule.morning", &self.schedule.morning),
            ("schedule.evening", &self.schedule.evening),
        ] {
            if parse_hhmm(raw).is_none() {
                return Err(RollcallError::Config(format!(
                    "{label} must be HH:MM, got '{raw}'"
                )));
            }
        }
        if let Some(day) = self.schedule.work_days.iter().find(|d| **d > 6) {
            return Err(RollcallError::Config(format!(
                "schedule.work_days contains {day}; use 0 (Sunday) to 6 (Saturday)"
            )));
        }
        for key in self.schedule.overrides.keys() {
            if !matches!(key.parse::<u8>(), Ok(0..=6)) {
                return Err(RollcallError::Config(format!(
                    "schedule.overrides key '{key}' is not a weekday number 0-6"
                )));
            }
        }
        if !(MIN_FOLLOWUPS..=MAX_FOLLOWUPS).contains(&self.schedule.default_max_followups) {
            return Err(RollcallError::Config(format!(
                "schedule.default_max_followups must be within {MIN_FOLLOWUPS}..={MAX_FOLLOWUPS}"
            )));
        }
        let backoff = &self.escalation.backoff_minutes;
        if backoff.is_empty() || backoff.contains(&0) {
            return Err(RollcallError::Config(
                "escalation.backoff_minutes must be non-empty and positive".into(),
            ));
        }
        if backoff.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RollcallError::Config(
                "escalation.backoff_minutes must be strictly increasing".into(),
            ));
        }
        for (label, expr) in [
            ("jobs.cleanup", &self.jobs.cleanup),
            ("jobs.backup", &self.jobs.backup),
            ("jobs.holiday_sync", &self.jobs.holiday_sync),
        ] {
            if expr.split_whitespace().count() != 5 {
                return Err(RollcallError::Config(format!(
                    "{label} must be a 5-field cron expression, got '{expr}'"
                )));
            }
        }
        if self.scanner.recap_weekday > 6 {
            return Err(RollcallError::Config(
                "scanner.recap_weekday must be 0-6".into(),
            ));
        }
        Ok(())
    }
}

fn bool_true() -> bool { true }

// ─── Schedule ───────────────────────────────────────────────

/// Defaults applied to newly registered recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_morning")]
    pub morning: String,
    #[serde(default = "default_evening")]
    pub evening: String,
    /// Weekday number → overrides, e.g. Friday evening later than usual.
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, DayOverride>,
    /// 0 = Sunday … 6 = Saturday.
    #[serde(default = "default_work_days")]
    pub work_days: Vec<u8>,
    #[serde(default = "default_max_followups")]
    pub default_max_followups: u8,
}

fn default_morning() -> String { "07:25".into() }
fn default_evening() -> String { "16:05".into() }
fn default_overrides() -> BTreeMap<String, DayOverride> {
    let mut map = BTreeMap::new();
    map.insert(
        "5".to_string(),
        DayOverride { morning: None, evening: Some("16:35".into()) },
    );
    map
}
fn default_work_days() -> Vec<u8> { vec![1, 2, 3, 4, 5] }
fn default_max_followups() -> u8 { DEFAULT_MAX_FOLLOWUPS }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            morning: default_morning(),
            evening: default_evening(),
            overrides: default_overrides(),
            work_days: default_work_days(),
            default_max_followups: default_max_followups(),
        }
    }
}

impl ScheduleConfig {
    /// Build a recipient carrying the configured defaults.
    pub fn new_recipient(&self, address: &str, name: &str, role: Role) -> Recipient {
        Recipient {
            address: address.to_string(),
            name: name.to_string(),
            role,
            morning: parse_hhmm(&self.morning)
                .unwrap_or_else(|| parse_hhmm(&default_morning()).unwrap_or_default()),
            evening: parse_hhmm(&self.evening)
                .unwrap_or_else(|| parse_hhmm(&default_evening()).unwrap_or_default()),
            overrides: self.overrides.clone(),
            work_days: self.work_days.clone(),
            max_followups: clamp_followups(self.default_max_followups as i64),
            active: true,
        }
    }
}

// ─── Escalation ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Minutes between consecutive follow-ups (Fibonacci by default).
    #[serde(default = "default_backoff")]
    pub backoff_minutes: Vec<u32>,
    /// Per-send timeout; a timed-out send counts as a failed send.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_backoff() -> Vec<u32> { vec![5, 8, 13, 21, 34, 55, 89, 144, 233, 377] }
fn default_send_timeout() -> u64 { 15 }

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            backoff_minutes: default_backoff(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

// ─── Scanner ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Receive-only service account; never gets reminders.
    #[serde(default)]
    pub service_address: Option<String>,
    #[serde(default = "bool_true")]
    pub weekly_recap: bool,
    /// Weekday (0 = Sunday) on which the recap goes out after the evening acknowledgment.
    #[serde(default = "default_recap_weekday")]
    pub recap_weekday: u8,
}

fn default_recap_weekday() -> u8 { 5 }

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            service_address: None,
            weekly_recap: true,
            recap_weekday: default_recap_weekday(),
        }
    }
}

// ─── Jobs ───────────────────────────────────────────────────

/// Ancillary periodic jobs, as `MIN HOUR * * *` expressions in effective time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_cleanup")]
    pub cleanup: String,
    #[serde(default = "default_backup")]
    pub backup: String,
    #[serde(default = "default_backup_keep_days")]
    pub backup_keep_days: u32,
    #[serde(default = "bool_true")]
    pub holiday_sync_enabled: bool,
    #[serde(default = "default_holiday_sync")]
    pub holiday_sync: String,
    #[serde(default = "default_holiday_api")]
    pub holiday_api_url: String,
}

fn default_cleanup() -> String { "0 0 * * *".into() }
fn default_backup() -> String { "0 2 * * *".into() }
fn default_backup_keep_days() -> u32 { 7 }
fn default_holiday_sync() -> String { "0 3 * * *".into() }
fn default_holiday_api() -> String { "https://libur.deno.dev/api".into() }

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cleanup: default_cleanup(),
            backup: default_backup(),
            backup_keep_days: default_backup_keep_days(),
            holiday_sync_enabled: true,
            holiday_sync: default_holiday_sync(),
            holiday_api_url: default_holiday_api(),
        }
    }
}

// ─── Storage ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

fn default_db_path() -> String { "~/.rollcall/rollcall.db".into() }
fn default_backup_dir() -> String { "~/.rollcall/backups".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backup_dir: default_backup_dir(),
        }
    }
}

// ─── Gateway ────────────────────────────────────────────────

/// HTTP gateway (health + admin API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Per-sender sliding window for self-service requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_messages() -> u32 { 10 }
fn default_window_secs() -> u64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            window_secs: default_window_secs(),
        }
    }
}

// ─── Channels ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub whatsapp: Option<WhatsAppChannelConfig>,
}

/// WhatsApp Business Cloud API channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Graph API access token.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_graph_api")]
    pub api_base: String,
    /// Consecutive failed reconnects before giving up.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_graph_api() -> String { "https://graph.facebook.com/v21.0".into() }
fn default_reconnect_attempts() -> u32 { 5 }
fn default_reconnect_delay_secs() -> u64 { 30 }

impl Default for WhatsAppChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: default_graph_api(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

// ─── Templates ──────────────────────────────────────────────

/// Message templates. Placeholders use `{name}` syntax; see `rollcall_scheduler::notify`
/// for the variables each template receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplates {
    #[serde(default = "default_initial_morning")]
    pub initial_morning: String,
    #[serde(default = "default_initial_evening")]
    pub initial_evening: String,
    #[serde(default = "default_followup_polite")]
    pub followup_polite: String,
    #[serde(default = "default_followup_direct")]
    pub followup_direct: String,
    #[serde(default = "default_followup_urgent")]
    pub followup_urgent: String,
    #[serde(default = "default_footer_progress")]
    pub footer_progress: String,
    #[serde(default = "default_footer_final")]
    pub footer_final: String,
    #[serde(default = "default_recap")]
    pub weekly_recap: String,
}

fn default_initial_morning() -> String {
    [
        "☀️  *MORNING CHECK-IN*",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "Good morning, *{name}*! 👋",
        "Time to record your attendance.",
        "",
        "📱 Open the attendance app and",
        "check in now.",
        "",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "  ✅ Reply *1* — Done",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "_⏳ Up to {max_followups} follow-ups until you confirm_",
    ]
    .join("\n")
}

fn default_initial_evening() -> String {
    [
        "🌆  *EVENING CHECK-OUT*",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "Hi *{name}*! Time to head home 🏠",
        "Don't forget to check out.",
        "",
        "📱 Open the attendance app and",
        "check out now.",
        "",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "  ✅ Reply *1* — Done",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "_⏳ Up to {max_followups} follow-ups until you confirm_",
    ]
    .join("\n")
}

fn default_followup_polite() -> String {
    [
        "🔔 *REMINDER #{count} — {CHECKPOINT}*",
        "",
        "Hi *{name}*, your {checkpoint} attendance",
        "isn't confirmed yet. Please take care of it 🙏",
        "",
        "✅ Reply *1* — Done",
        "",
        "{footer}",
    ]
    .join("\n")
}

fn default_followup_direct() -> String {
    [
        "🔔 *REMINDER #{count} — {CHECKPOINT}*",
        "",
        "*{name}*, your {checkpoint} attendance is still missing.",
        "Please record it now! ⚠️",
        "",
        "✅ Reply *1* once done",
        "",
        "{footer}",
    ]
    .join("\n")
}

fn default_followup_urgent() -> String {
    [
        "⚠️ *URGENT — {CHECKPOINT}*",
        "",
        "*{name}*, RECORD YOUR {CHECKPOINT} ATTENDANCE NOW!",
        "Reminder {count} of {total}.",
        "",
        "✅ Reply *1* once done",
        "",
        "{footer}",
    ]
    .join("\n")
}

fn default_footer_progress() -> String {
    "_⏳ Reminder {count}/{total} · next in {next_minutes} min_".into()
}

fn default_footer_final() -> String {
    "_⚠️ This is the last reminder ({count}/{total})_".into()
}

fn default_recap() -> String {
    [
        "📊  *WEEKLY RECAP*",
        "━━━━━━━━━━━━━━━━━━━━━━━",
        "",
        "Period: {start} — {end}",
        "",
        "👤 *{name}*",
        "",
        "✅ Morning : *{morning}/{expected}* days",
        "✅ Evening : *{evening}/{expected}* days",
        "📈 Compliance : *{percentage}%*",
        "",
        "{status}",
    ]
    .join("\n")
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            initial_morning: default_initial_morning(),
            initial_evening: default_initial_evening(),
            followup_polite: default_followup_polite(),
            followup_direct: default_followup_direct(),
            followup_urgent: default_followup_urgent(),
            footer_progress: default_footer_progress(),
            footer_final: default_footer_final(),
            weekly_recap: default_recap(),
        }
    }
}
