//! SQLite-backed recipient directory.
//!
//! Source of truth for recipients, acknowledgments, holidays, leaves and the
//! per-sender rate limit. Escalation state is never persisted here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::Directory;
use rollcall_core::types::{
    AckMethod, Acknowledgment, Checkpoint, DayOverride, Holiday, Leave, LeaveStatus, Recipient,
    Role, clamp_followups, format_hhmm, parse_hhmm,
};
use rusqlite::{Connection, OptionalExtension, params};

const DATE_FMT: &str = "%Y-%m-%d";
const FALLBACK_MORNING: &str = "07:25";
const FALLBACK_EVENING: &str = "16:05";
const FALLBACK_WORK_DAYS: [u8; 5] = [1, 2, 3, 4, 5];
const BACKUP_PREFIX: &str = "rollcall-";
const BACKUP_SUFFIX: &str = ".db";

fn db_err(e: rusqlite::Error) -> RollcallError {
    RollcallError::Directory(e.to_string())
}

fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).ok()
}

/// Rusqlite conversion error for a column that holds malformed text.
fn bad_column(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {what} '{raw}'").into(),
    )
}

/// Recipient directory on a single SQLite connection.
pub struct SqliteDirectory {
    conn: Mutex<Connection>,
}

impl SqliteDirectory {
    /// Open or create the directory database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let dir = Self { conn: Mutex::new(conn) };
        dir.migrate()?;
        tracing::info!("💾 Directory opened: {}", path.display());
        Ok(dir)
    }

    /// Fresh, private database. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let dir = Self { conn: Mutex::new(conn) };
        dir.migrate()?;
        Ok(dir)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RollcallError::Directory(format!("Lock: {e}")))
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS recipients (
                address TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'standard',
                morning TEXT NOT NULL,
                evening TEXT NOT NULL,
                overrides TEXT NOT NULL DEFAULT '{}',   -- JSON: {\"5\": {\"evening\": \"16:35\"}}
                work_days TEXT NOT NULL DEFAULT '[1,2,3,4,5]',
                max_followups INTEGER NOT NULL DEFAULT 10,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS acknowledgments (
                address TEXT NOT NULL,
                date TEXT NOT NULL,
                checkpoint TEXT NOT NULL,               -- 'morning', 'evening'
                acknowledged_at TEXT NOT NULL,          -- HH:MM effective time
                method TEXT NOT NULL DEFAULT 'self',    -- 'self', 'operator'
                PRIMARY KEY (address, date, checkpoint)
            );

            CREATE TABLE IF NOT EXISTS leaves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',  -- 'active', 'cancelled'
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS holidays (
                date TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                national INTEGER NOT NULL DEFAULT 0,
                created_by TEXT
            );

            CREATE TABLE IF NOT EXISTS rate_limits (
                address TEXT PRIMARY KEY,
                window_start INTEGER NOT NULL,          -- unix seconds
                message_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_ack_address_date ON acknowledgments(address, date);
            CREATE INDEX IF NOT EXISTS idx_leaves_address ON leaves(address, status);
            ",
        )
        .map_err(|e| RollcallError::Directory(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Recipients ──────────────────────────────────────────

    fn row_to_recipient(row: &rusqlite::Row) -> rusqlite::Result<Recipient> {
        let address: String = row.get(0)?;
        let morning_raw: String = row.get(3)?;
        let evening_raw: String = row.get(4)?;
        let overrides_raw: String = row.get(5)?;
        let work_days_raw: String = row.get(6)?;

        let time_or_default = |raw: &str, fallback: &str, label: &str| {
            parse_hhmm(raw).unwrap_or_else(|| {
                tracing::warn!("⚠️ Invalid {} time '{}' for {}, using {}", label, raw, address, fallback);
                parse_hhmm(fallback).unwrap_or(NaiveTime::MIN)
            })
        };
        let overrides: BTreeMap<String, DayOverride> = serde_json::from_str(&overrides_raw)
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Invalid overrides for {}: {e}, ignoring", address);
                BTreeMap::new()
            });
        let work_days: Vec<u8> = serde_json::from_str(&work_days_raw).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Invalid work days for {}: {e}, using Mon-Fri", address);
            FALLBACK_WORK_DAYS.to_vec()
        });

        Ok(Recipient {
            name: row.get(1)?,
            role: Role::parse(&row.get::<_, String>(2)?),
            morning: time_or_default(&morning_raw, FALLBACK_MORNING, "morning"),
            evening: time_or_default(&evening_raw, FALLBACK_EVENING, "evening"),
            overrides,
            work_days,
            max_followups: clamp_followups(row.get::<_, i64>(7)?),
            active: row.get::<_, i32>(8)? != 0,
            address,
        })
    }

    const RECIPIENT_COLUMNS: &'static str =
        "address, name, role, morning, evening, overrides, work_days, max_followups, active";

    fn query_recipients(&self, where_clause: &str) -> Result<Vec<Recipient>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM recipients {where_clause} ORDER BY created_at, address",
            Self::RECIPIENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::row_to_recipient)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Every recipient, including paused ones.
    pub fn list_recipients(&self) -> Result<Vec<Recipient>> {
        self.query_recipients("")
    }

    /// Insert a recipient if the address is new. Returns the stored record,
    /// which is the existing one when the address was already registered.
    pub fn register_recipient(&self, recipient: &Recipient) -> Result<Recipient> {
        {
            let conn = self.conn()?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO recipients
                     (address, name, role, morning, evening, overrides, work_days, max_followups, active, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        recipient.address,
                        recipient.name,
                        recipient.role.as_str(),
                        format_hhmm(recipient.morning),
                        format_hhmm(recipient.evening),
                        serde_json::to_string(&recipient.overrides)?,
                        serde_json::to_string(&recipient.work_days)?,
                        recipient.cap() as i64,
                        recipient.active as i32,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(db_err)?;
            if inserted > 0 {
                tracing::info!("👤 Recipient registered: {} ({})", recipient.name, recipient.address);
            }
        }
        self.recipient(&recipient.address)?
            .ok_or_else(|| RollcallError::NotFound(recipient.address.clone()))
    }

    /// Insert or fully replace a recipient's settings.
    pub fn upsert_recipient(&self, recipient: &Recipient) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO recipients
             (address, name, role, morning, evening, overrides, work_days, max_followups, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                name = excluded.name, role = excluded.role,
                morning = excluded.morning, evening = excluded.evening,
                overrides = excluded.overrides, work_days = excluded.work_days,
                max_followups = excluded.max_followups, active = excluded.active",
            params![
                recipient.address,
                recipient.name,
                recipient.role.as_str(),
                format_hhmm(recipient.morning),
                format_hhmm(recipient.evening),
                serde_json::to_string(&recipient.overrides)?,
                serde_json::to_string(&recipient.work_days)?,
                recipient.cap() as i64,
                recipient.active as i32,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn update_field(&self, address: &str, column: &str, value: &dyn rusqlite::ToSql) -> Result<bool> {
        let conn = self.conn()?;
        let sql = format!("UPDATE recipients SET {column} = ?1 WHERE address = ?2");
        let n = conn.execute(&sql, params![value, address]).map_err(db_err)?;
        Ok(n > 0)
    }

    /// Pause or resume a recipient. Returns false for an unknown address.
    pub fn set_active(&self, address: &str, active: bool) -> Result<bool> {
        self.update_field(address, "active", &(active as i32))
    }

    pub fn set_checkpoint_time(&self, address: &str, checkpoint: Checkpoint, time: NaiveTime) -> Result<bool> {
        self.update_field(address, checkpoint.as_str(), &format_hhmm(time))
    }

    /// Set or clear (`None`) the override for one checkpoint on one weekday.
    pub fn set_day_override(
        &self,
        address: &str,
        weekday: u8,
        checkpoint: Checkpoint,
        time: Option<NaiveTime>,
    ) -> Result<bool> {
        if weekday > 6 {
            return Err(RollcallError::InvalidInput(format!("weekday {weekday} out of range 0-6")));
        }
        let Some(mut recipient) = self.recipient(address)? else {
            return Ok(false);
        };
        let key = weekday.to_string();
        let entry = recipient.overrides.entry(key.clone()).or_default();
        let value = time.map(format_hhmm);
        match checkpoint {
            Checkpoint::Morning => entry.morning = value,
            Checkpoint::Evening => entry.evening = value,
        }
        if entry.morning.is_none() && entry.evening.is_none() {
            recipient.overrides.remove(&key);
        }
        self.update_field(address, "overrides", &serde_json::to_string(&recipient.overrides)?)
    }

    pub fn set_work_days(&self, address: &str, days: &[u8]) -> Result<bool> {
        if let Some(bad) = days.iter().find(|d| **d > 6) {
            return Err(RollcallError::InvalidInput(format!("weekday {bad} out of range 0-6")));
        }
        let mut days = days.to_vec();
        days.sort_unstable();
        days.dedup();
        self.update_field(address, "work_days", &serde_json::to_string(&days)?)
    }

    /// Set the escalation cap, clamped to the allowed range. Returns the
    /// stored value, or `None` for an unknown address.
    pub fn set_max_followups(&self, address: &str, requested: i64) -> Result<Option<u8>> {
        let cap = clamp_followups(requested);
        Ok(self
            .update_field(address, "max_followups", &(cap as i64))?
            .then_some(cap))
    }

    /// Delete a recipient together with its acknowledgments, leaves and
    /// rate-limit window. Returns false for an unknown address.
    pub fn remove_recipient(&self, address: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM acknowledgments WHERE address = ?1", params![address])
            .map_err(db_err)?;
        tx.execute("DELETE FROM leaves WHERE address = ?1", params![address])
            .map_err(db_err)?;
        tx.execute("DELETE FROM rate_limits WHERE address = ?1", params![address])
            .map_err(db_err)?;
        let n = tx
            .execute("DELETE FROM recipients WHERE address = ?1", params![address])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        if n > 0 {
            tracing::info!("🗑️ Recipient removed: {}", address);
        }
        Ok(n > 0)
    }

    // ─── Leaves ──────────────────────────────────────────────

    fn row_to_leave(row: &rusqlite::Row) -> rusqlite::Result<Leave> {
        let start_raw: String = row.get(2)?;
        let end_raw: String = row.get(3)?;
        let status: String = row.get(5)?;
        Ok(Leave {
            id: row.get(0)?,
            address: row.get(1)?,
            start: parse_date(&start_raw).ok_or_else(|| bad_column(2, "date", &start_raw))?,
            end: parse_date(&end_raw).ok_or_else(|| bad_column(3, "date", &end_raw))?,
            reason: row.get(4)?,
            status: if status == "cancelled" {
                LeaveStatus::Cancelled
            } else {
                LeaveStatus::Active
            },
        })
    }

    /// Register a leave over `start..=end`.
    pub fn add_leave(&self, address: &str, start: NaiveDate, end: NaiveDate, reason: &str) -> Result<Leave> {
        if end < start {
            return Err(RollcallError::InvalidInput(format!(
                "leave ends ({end}) before it starts ({start})"
            )));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO leaves (address, start_date, end_date, reason, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
            params![address, fmt_date(start), fmt_date(end), reason, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        tracing::info!("🏖️ Leave #{} for {}: {} → {} ({})", id, address, start, end, reason);
        Ok(Leave {
            id,
            address: address.to_string(),
            start,
            end,
            reason: reason.to_string(),
            status: LeaveStatus::Active,
        })
    }

    /// Cancel an active leave. When `address` is given the leave must belong
    /// to it. Returns the cancelled leave, or `None` if nothing matched.
    pub fn cancel_leave(&self, id: i64, address: Option<&str>) -> Result<Option<Leave>> {
        let conn = self.conn()?;
        let n = conn
            .execute(
                "UPDATE leaves SET status = 'cancelled'
                 WHERE id = ?1 AND status = 'active' AND (?2 IS NULL OR address = ?2)",
                params![id, address],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Ok(None);
        }
        conn.query_row(
            "SELECT id, address, start_date, end_date, reason, status FROM leaves WHERE id = ?1",
            params![id],
            Self::row_to_leave,
        )
        .optional()
        .map_err(db_err)
    }

    /// All leaves for `address`, newest first, including cancelled ones.
    pub fn leaves_for(&self, address: &str) -> Result<Vec<Leave>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, address, start_date, end_date, reason, status FROM leaves
                 WHERE address = ?1 ORDER BY start_date DESC, id DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![address], Self::row_to_leave)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    // ─── Holidays ────────────────────────────────────────────

    fn row_to_holiday(row: &rusqlite::Row) -> rusqlite::Result<Holiday> {
        let raw: String = row.get(0)?;
        Ok(Holiday {
            date: parse_date(&raw).ok_or_else(|| bad_column(0, "date", &raw))?,
            name: row.get(1)?,
            national: row.get::<_, i32>(2)? != 0,
            created_by: row.get(3)?,
        })
    }

    /// Add or rename a local holiday.
    pub fn add_holiday(&self, date: NaiveDate, name: &str, created_by: Option<&str>) -> Result<Holiday> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO holidays (date, name, national, created_by) VALUES (?1, ?2, 0, ?3)",
            params![fmt_date(date), name, created_by],
        )
        .map_err(db_err)?;
        tracing::info!("📅 Holiday added: {} ({})", date, name);
        Ok(Holiday {
            date,
            name: name.to_string(),
            national: false,
            created_by: created_by.map(String::from),
        })
    }

    pub fn remove_holiday(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn
            .execute("DELETE FROM holidays WHERE date = ?1", params![fmt_date(date)])
            .map_err(db_err)?;
        Ok(n > 0)
    }

    /// Holidays on or after `from`, earliest first.
    pub fn upcoming_holidays(&self, from: NaiveDate, limit: usize) -> Result<Vec<Holiday>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, name, national, created_by FROM holidays
                 WHERE date >= ?1 ORDER BY date LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![fmt_date(from), limit as i64], Self::row_to_holiday)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    // ─── Rate limit ──────────────────────────────────────────

    /// Count one message from `address` against a fixed window. Returns false
    /// once `max_messages` have been counted within `window_secs`.
    pub fn check_rate_limit(&self, address: &str, max_messages: u32, window_secs: u64) -> Result<bool> {
        self.check_rate_limit_at(address, max_messages, window_secs, Utc::now().timestamp())
    }

    pub fn check_rate_limit_at(
        &self,
        address: &str,
        max_messages: u32,
        window_secs: u64,
        now_secs: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT window_start, message_count FROM rate_limits WHERE address = ?1",
                params![address],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        match row {
            Some((start, count)) if now_secs - start < window_secs as i64 => {
                if count >= max_messages as i64 {
                    return Ok(false);
                }
                conn.execute(
                    "UPDATE rate_limits SET message_count = message_count + 1 WHERE address = ?1",
                    params![address],
                )
                .map_err(db_err)?;
            }
            _ => {
                conn.execute(
                    "INSERT OR REPLACE INTO rate_limits (address, window_start, message_count) VALUES (?1, ?2, 1)",
                    params![address, now_secs],
                )
                .map_err(db_err)?;
            }
        }
        Ok(true)
    }

    // ─── Backup ──────────────────────────────────────────────

    /// Write a consistent copy of the database to `dir/rollcall-<date>.db`,
    /// replacing an existing backup for the same date.
    pub fn backup_to(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let target = dir.join(format!("{BACKUP_PREFIX}{}{BACKUP_SUFFIX}", fmt_date(date)));
        if target.exists() {
            std::fs::remove_file(&target)?;
        }
        let conn = self.conn()?;
        conn.execute("VACUUM INTO ?1", params![target.to_string_lossy()])
            .map_err(|e| RollcallError::Directory(format!("Backup: {e}")))?;
        tracing::info!("💾 Backup created: {}", target.display());
        Ok(target)
    }

    /// Delete backups dated more than `keep_days` before `today`. Files that
    /// do not follow the backup naming scheme are left alone.
    pub fn prune_backups(dir: &Path, keep_days: u32, today: NaiveDate) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }
        let cutoff = today - Duration::days(keep_days as i64);
        let mut removed = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| n.strip_prefix(BACKUP_PREFIX))
                .and_then(|n| n.strip_suffix(BACKUP_SUFFIX))
                .and_then(parse_date)
            else {
                continue;
            };
            if date < cutoff {
                std::fs::remove_file(entry.path())?;
                tracing::info!("🗑️ Old backup deleted: {}", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Directory for SqliteDirectory {
    fn active_recipients(&self) -> Result<Vec<Recipient>> {
        self.query_recipients("WHERE active = 1")
    }

    fn recipient(&self, address: &str) -> Result<Option<Recipient>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM recipients WHERE address = ?1", Self::RECIPIENT_COLUMNS);
        conn.query_row(&sql, params![address], Self::row_to_recipient)
            .optional()
            .map_err(db_err)
    }

    fn acknowledgment(
        &self,
        address: &str,
        date: NaiveDate,
        checkpoint: Checkpoint,
    ) -> Result<Option<Acknowledgment>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT address, date, checkpoint, acknowledged_at, method FROM acknowledgments
             WHERE address = ?1 AND date = ?2 AND checkpoint = ?3",
            params![address, fmt_date(date), checkpoint.as_str()],
            row_to_ack,
        )
        .optional()
        .map_err(db_err)
    }

    fn acknowledgments_between(
        &self,
        address: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Acknowledgment>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT address, date, checkpoint, acknowledged_at, method FROM acknowledgments
                 WHERE address = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date, checkpoint",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![address, fmt_date(start), fmt_date(end)], row_to_ack)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn record_acknowledgment(
        &self,
        address: &str,
        date: NaiveDate,
        checkpoint: Checkpoint,
        method: AckMethod,
        at: NaiveTime,
    ) -> Result<Acknowledgment> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO acknowledgments (address, date, checkpoint, acknowledged_at, method)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(address, date, checkpoint) DO NOTHING",
                params![
                    address,
                    fmt_date(date),
                    checkpoint.as_str(),
                    format_hhmm(at),
                    method.as_str()
                ],
            )
            .map_err(db_err)?;
        }
        self.acknowledgment(address, date, checkpoint)?
            .ok_or_else(|| RollcallError::Directory("acknowledgment vanished after insert".into()))
    }

    fn holiday(&self, date: NaiveDate) -> Result<Option<Holiday>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT date, name, national, created_by FROM holidays WHERE date = ?1",
            params![fmt_date(date)],
            Self::row_to_holiday,
        )
        .optional()
        .map_err(db_err)
    }

    fn active_leaves(&self, address: &str, date: NaiveDate) -> Result<Vec<Leave>> {
        let conn = self.conn()?;
        let day = fmt_date(date);
        let mut stmt = conn
            .prepare(
                "SELECT id, address, start_date, end_date, reason, status FROM leaves
                 WHERE address = ?1 AND status = 'active' AND start_date <= ?2 AND end_date >= ?2
                 ORDER BY start_date",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![address, day], Self::row_to_leave)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn purge_stale(&self) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM rate_limits", []).map_err(db_err)
    }

    fn sync_national_holidays(&self, holidays: &[Holiday]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM holidays WHERE national = 1", [])
            .map_err(db_err)?;
        let mut inserted = 0;
        for h in holidays {
            // Local holidays on the same date win.
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO holidays (date, name, national, created_by) VALUES (?1, ?2, 1, NULL)",
                    params![fmt_date(h.date), h.name],
                )
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(inserted)
    }
}

fn row_to_ack(row: &rusqlite::Row) -> rusqlite::Result<Acknowledgment> {
    let date_raw: String = row.get(1)?;
    let cp_raw: String = row.get(2)?;
    let at_raw: String = row.get(3)?;
    Ok(Acknowledgment {
        address: row.get(0)?,
        date: parse_date(&date_raw).ok_or_else(|| bad_column(1, "date", &date_raw))?,
        checkpoint: cp_raw
            .parse()
            .map_err(|_| bad_column(2, "checkpoint", &cp_raw))?,
        acknowledged_at: parse_hhmm(&at_raw).ok_or_else(|| bad_column(3, "time", &at_raw))?,
        method: AckMethod::parse(&row.get::<_, String>(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::config::ScheduleConfig;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        parse_hhmm(s).unwrap()
    }

    fn seeded() -> SqliteDirectory {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        let schedule = ScheduleConfig::default();
        dir.register_recipient(&schedule.new_recipient("62811", "Rina", Role::Standard))
            .unwrap();
        dir.register_recipient(&schedule.new_recipient("62822", "Budi", Role::Privileged))
            .unwrap();
        dir
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = seeded();
        let again = ScheduleConfig::default().new_recipient("62811", "Someone Else", Role::Standard);
        let stored = dir.register_recipient(&again).unwrap();
        assert_eq!(stored.name, "Rina");
        assert_eq!(dir.list_recipients().unwrap().len(), 2);
    }

    #[test]
    fn test_active_filter_and_pause() {
        let dir = seeded();
        assert_eq!(dir.active_recipients().unwrap().len(), 2);
        assert!(dir.set_active("62811", false).unwrap());
        let active = dir.active_recipients().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, "62822");
        assert!(!dir.set_active("nobody", false).unwrap());
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = seeded();
        dir.set_checkpoint_time("62811", Checkpoint::Morning, t("08:00")).unwrap();
        dir.set_day_override("62811", 1, Checkpoint::Morning, Some(t("09:00"))).unwrap();
        dir.set_work_days("62811", &[1, 3, 3, 5]).unwrap();
        assert_eq!(dir.set_max_followups("62811", 25).unwrap(), Some(10));
        assert_eq!(dir.set_max_followups("nobody", 3).unwrap(), None);

        let r = dir.recipient("62811").unwrap().unwrap();
        assert_eq!(r.morning, t("08:00"));
        assert_eq!(r.work_days, vec![1, 3, 5]);
        assert_eq!(r.max_followups, 10);
        assert_eq!(r.effective_time(Checkpoint::Morning, chrono::Weekday::Mon), t("09:00"));
        assert_eq!(r.effective_time(Checkpoint::Evening, chrono::Weekday::Fri), t("16:35"));

        dir.set_day_override("62811", 5, Checkpoint::Evening, None).unwrap();
        let r = dir.recipient("62811").unwrap().unwrap();
        assert!(!r.overrides.contains_key("5"));
        assert!(dir.set_day_override("62811", 9, Checkpoint::Evening, None).is_err());
    }

    #[test]
    fn test_malformed_stored_values_recover() {
        let dir = seeded();
        {
            let conn = dir.conn().unwrap();
            conn.execute(
                "UPDATE recipients SET morning = 'soon', overrides = '{broken', work_days = 'x' WHERE address = '62811'",
                [],
            )
            .unwrap();
        }
        let r = dir.recipient("62811").unwrap().unwrap();
        assert_eq!(r.morning, t("07:25"));
        assert!(r.overrides.is_empty());
        assert_eq!(r.work_days, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_acknowledgment_upsert_keeps_first() {
        let dir = seeded();
        let day = d("2026-02-20");
        let first = dir
            .record_acknowledgment("62811", day, Checkpoint::Morning, AckMethod::SelfReported, t("07:30"))
            .unwrap();
        let second = dir
            .record_acknowledgment("62811", day, Checkpoint::Morning, AckMethod::OperatorForced, t("09:00"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.method, AckMethod::SelfReported);
        assert!(dir.acknowledgment("62811", day, Checkpoint::Evening).unwrap().is_none());
        assert_eq!(
            dir.acknowledgments_between("62811", d("2026-02-16"), day).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_exemptions() {
        let dir = seeded();
        let leave = dir
            .add_leave("62811", d("2026-02-18"), d("2026-02-19"), "sick")
            .unwrap();
        assert!(dir.is_exempt("62811", d("2026-02-18")).unwrap());
        assert!(dir.is_exempt("62811", d("2026-02-19")).unwrap());
        assert!(!dir.is_exempt("62811", d("2026-02-20")).unwrap());
        assert!(!dir.is_exempt("62822", d("2026-02-18")).unwrap());

        assert!(dir.cancel_leave(leave.id, Some("62822")).unwrap().is_none());
        let cancelled = dir.cancel_leave(leave.id, Some("62811")).unwrap().unwrap();
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
        assert!(!dir.is_exempt("62811", d("2026-02-18")).unwrap());
        assert_eq!(dir.leaves_for("62811").unwrap().len(), 1);

        dir.add_holiday(d("2026-02-17"), "Lunar New Year", Some("62822")).unwrap();
        assert!(dir.is_exempt("62811", d("2026-02-17")).unwrap());
        assert!(dir.is_exempt("62822", d("2026-02-17")).unwrap());

        assert!(dir.add_leave("62811", d("2026-02-19"), d("2026-02-18"), "x").is_err());
    }

    #[test]
    fn test_national_sync_keeps_local_holidays() {
        let dir = seeded();
        dir.add_holiday(d("2026-03-01"), "Office anniversary", None).unwrap();
        let national = |date: &str, name: &str| Holiday {
            date: d(date),
            name: name.into(),
            national: true,
            created_by: None,
        };
        dir.sync_national_holidays(&[national("2026-01-01", "New Year")]).unwrap();
        let n = dir
            .sync_national_holidays(&[
                national("2026-03-01", "Clash"),
                national("2026-08-17", "Independence Day"),
            ])
            .unwrap();
        assert_eq!(n, 1);
        let all = dir.upcoming_holidays(d("2026-01-01"), 10).unwrap();
        let names: Vec<&str> = all.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Office anniversary", "Independence Day"]);
        assert!(dir.remove_holiday(d("2026-03-01")).unwrap());
    }

    #[test]
    fn test_rate_limit_window() {
        let dir = seeded();
        for _ in 0..3 {
            assert!(dir.check_rate_limit_at("62811", 3, 60, 1_000).unwrap());
        }
        assert!(!dir.check_rate_limit_at("62811", 3, 60, 1_030).unwrap());
        assert!(dir.check_rate_limit_at("62822", 3, 60, 1_030).unwrap());
        assert!(dir.check_rate_limit_at("62811", 3, 60, 1_061).unwrap());
        assert_eq!(dir.purge_stale().unwrap(), 2);
    }

    #[test]
    fn test_remove_cascades() {
        let dir = seeded();
        dir.record_acknowledgment("62811", d("2026-02-20"), Checkpoint::Morning, AckMethod::SelfReported, t("07:30"))
            .unwrap();
        dir.add_leave("62811", d("2026-02-23"), d("2026-02-24"), "trip").unwrap();
        assert!(dir.remove_recipient("62811").unwrap());
        assert!(dir.recipient("62811").unwrap().is_none());
        assert!(dir.leaves_for("62811").unwrap().is_empty());
        assert!(dir.acknowledgment("62811", d("2026-02-20"), Checkpoint::Morning).unwrap().is_none());
        assert!(!dir.remove_recipient("62811").unwrap());
    }

    #[test]
    fn test_backup_and_prune() {
        let backups = std::env::temp_dir().join("rollcall-backup-test");
        std::fs::remove_dir_all(&backups).ok();
        let dir = seeded();

        let old = dir.backup_to(&backups, d("2026-02-01")).unwrap();
        let fresh = dir.backup_to(&backups, d("2026-02-20")).unwrap();
        std::fs::write(backups.join("notes.txt"), "keep").unwrap();
        assert!(old.exists() && fresh.exists());

        let copy = SqliteDirectory::open(&fresh).unwrap();
        assert_eq!(copy.list_recipients().unwrap().len(), 2);
        drop(copy);

        let removed = SqliteDirectory::prune_backups(&backups, 7, d("2026-02-20")).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(backups.join("notes.txt").exists());
        std::fs::remove_dir_all(&backups).ok();
    }
}
