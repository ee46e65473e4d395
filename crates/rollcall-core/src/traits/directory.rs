//! Directory trait: source of truth for recipients, exemptions and acknowledgments.

use chrono::{NaiveDate, NaiveTime, Weekday};

use crate::error::Result;
use crate::types::{AckMethod, Acknowledgment, Checkpoint, Holiday, Leave, Recipient};

/// Synchronous data access used by the tick scanner and the escalation engine.
///
/// Implementations must give read-your-writes consistency for
/// acknowledgments: a record written through [`Directory::record_acknowledgment`]
/// is visible to the next [`Directory::acknowledgment`] call.
pub trait Directory: Send + Sync {
    /// All recipients with the active flag set, in storage order.
    fn active_recipients(&self) -> Result<Vec<Recipient>>;

    fn recipient(&self, address: &str) -> Result<Option<Recipient>>;

    /// Reminder time for a checkpoint on a weekday after applying overrides.
    fn effective_checkpoint_time(
        &self,
        recipient: &Recipient,
        checkpoint: Checkpoint,
        day: Weekday,
    ) -> NaiveTime {
        recipient.effective_time(checkpoint, day)
    }

    fn acknowledgment(
        &self,
        address: &str,
        date: NaiveDate,
        checkpoint: Checkpoint,
    ) -> Result<Option<Acknowledgment>>;

    /// Acknowledgments for `address` with `start <= date <= end`.
    fn acknowledgments_between(
        &self,
        address: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Acknowledgment>>;

    /// Idempotent upsert: a second call for the same key returns the first record.
    fn record_acknowledgment(
        &self,
        address: &str,
        date: NaiveDate,
        checkpoint: Checkpoint,
        method: AckMethod,
        at: NaiveTime,
    ) -> Result<Acknowledgment>;

    fn holiday(&self, date: NaiveDate) -> Result<Option<Holiday>>;

    fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.holiday(date)?.is_some())
    }

    /// Active leaves for `address` covering `date`.
    fn active_leaves(&self, address: &str, date: NaiveDate) -> Result<Vec<Leave>>;

    /// Holiday or covering leave.
    fn is_exempt(&self, address: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.is_holiday(date)? || !self.active_leaves(address, date)?.is_empty())
    }

    /// Drop per-day bookkeeping (rate-limit windows) at the daily reset.
    /// Returns rows removed.
    fn purge_stale(&self) -> Result<usize>;

    /// Replace all national holidays with `holidays`. Local holidays are kept.
    fn sync_national_holidays(&self, holidays: &[Holiday]) -> Result<usize>;
}
