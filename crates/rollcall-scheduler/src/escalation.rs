//! Escalation engine: per-recipient, per-checkpoint follow-up chains.
//!
//! A chain starts with the initial reminder and then re-arms a one-shot
//! timer for each follow-up, spacing them by the backoff sequence. It ends
//! when the recipient acknowledges, becomes exempt or paused, the cap or the
//! sequence length is reached, or someone cancels it.
//!
//! ```text
//! begin ──> [ACTIVE step=0] ──fire──> [ACTIVE step=1] ──fire──> … ──> ABSENT
//!                 │                          │
//!                 └──── cancel / ack / exempt ┴──────────────────────> ABSENT
//! ```
//!
//! Every chain carries a generation id. A timer callback only acts on the
//! entry it was armed for, so a callback racing a cancel (or a cancel and a
//! fresh begin) finds nothing to do and returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use futures::FutureExt;
use rollcall_core::config::EscalationConfig;
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::{Clock, Directory, DispatchGateway};
use rollcall_core::types::{AckMethod, Acknowledgment, Checkpoint, Recipient, format_hhmm};
use serde::Serialize;

use crate::notify::{Formatter, Progress, Tier};
use crate::timer::{TimerHandle, Timers, TokioTimers};

/// Called with `(address, checkpoint)` after every successful reminder send.
pub type ReminderListener = Arc<dyn Fn(&str, Checkpoint) + Send + Sync>;

type ChainKey = (String, Checkpoint);

struct Chain {
    id: u64,
    date: NaiveDate,
    name: String,
    cap: u8,
    /// Follow-ups already sent.
    step: u32,
    started_at: NaiveTime,
    handle: TimerHandle,
}

/// Result of [`EscalationEngine::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeginOutcome {
    /// Chain created. `initial_sent` is false when the first send failed;
    /// follow-ups are still scheduled.
    Started { initial_sent: bool },
    AlreadyActive,
    AlreadyAcknowledged,
}

/// Snapshot of a live chain for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub address: String,
    pub name: String,
    pub checkpoint: Checkpoint,
    pub date: NaiveDate,
    pub started_at: String,
    pub followups_sent: u32,
    pub cap: u8,
    pub total: u32,
}

pub struct EscalationEngine {
    directory: Arc<dyn Directory>,
    gateway: Arc<dyn DispatchGateway>,
    clock: Arc<dyn Clock>,
    timers: Arc<dyn Timers>,
    formatter: Formatter,
    backoff: Vec<u32>,
    send_timeout: Duration,
    chains: Mutex<HashMap<ChainKey, Chain>>,
    next_id: AtomicU64,
    listeners: RwLock<Vec<ReminderListener>>,
}

impl EscalationEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        gateway: Arc<dyn DispatchGateway>,
        clock: Arc<dyn Clock>,
        formatter: Formatter,
        config: &EscalationConfig,
    ) -> Self {
        Self {
            directory,
            gateway,
            clock,
            timers: Arc::new(TokioTimers),
            formatter,
            backoff: config.backoff_minutes.clone(),
            send_timeout: Duration::from_secs(config.send_timeout_secs.max(1)),
            chains: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Replace the timer backend.
    pub fn with_timers(mut self, timers: Arc<dyn Timers>) -> Self {
        self.timers = timers;
        self
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn gateway(&self) -> &Arc<dyn DispatchGateway> {
        &self.gateway
    }

    /// Register a callback for every reminder sent (initial and follow-up).
    pub fn on_reminder_fired<F>(&self, f: F)
    where
        F: Fn(&str, Checkpoint) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.push(Arc::new(f));
    }

    fn chains(&self) -> MutexGuard<'_, HashMap<ChainKey, Chain>> {
        self.chains.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Follow-ups a chain with this cap sends at most.
    pub fn total_for(&self, cap: u8) -> u32 {
        (cap as u32).min(self.backoff.len() as u32)
    }

    /// Real delay for a backoff step, scaled by the clock's speed.
    fn delay_for(&self, minutes: u32) -> Duration {
        let speed = self.clock.speed_multiplier();
        let speed = if speed.is_finite() && speed >= 1.0 { speed } else { 1.0 };
        Duration::from_secs_f64(minutes as f64 * 60.0 / speed)
    }

    // ─── Public operations ───────────────────────────────────

    /// Send the initial reminder and start the follow-up chain.
    ///
    /// No-op when a chain for this key is already running or the checkpoint
    /// is already acknowledged for today. Exemption is the caller's concern.
    pub async fn begin(self: &Arc<Self>, recipient: &Recipient, checkpoint: Checkpoint) -> Result<BeginOutcome> {
        let now = self.clock.now();
        let address = recipient.address.as_str();

        if self
            .directory
            .acknowledgment(address, now.date, checkpoint)?
            .is_some()
        {
            tracing::debug!("⏭️ {} {} already acknowledged, not starting", address, checkpoint);
            return Ok(BeginOutcome::AlreadyAcknowledged);
        }

        let key: ChainKey = (address.to_string(), checkpoint);
        let cap = recipient.cap();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut chains = self.chains();
            if chains.contains_key(&key) {
                tracing::debug!("⏭️ {} {} chain already active", address, checkpoint);
                return Ok(BeginOutcome::AlreadyActive);
            }
            chains.insert(
                key.clone(),
                Chain {
                    id,
                    date: now.date,
                    name: recipient.name.clone(),
                    cap,
                    step: 0,
                    started_at: now.time,
                    handle: TimerHandle::detached(),
                },
            );
        }

        let total = self.total_for(cap);
        let next = if total > 0 { self.backoff.first().copied() } else { None };
        let body = self.formatter.initial(checkpoint, &recipient.name, total, next);

        let initial_sent = match self.deliver(address, &body).await {
            Ok(()) => {
                tracing::info!(
                    "📨 Initial {} reminder sent to {} ({}) at {}",
                    checkpoint,
                    recipient.name,
                    address,
                    now.hhmm()
                );
                self.notify_listeners(address, checkpoint);
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ Initial {} reminder to {} failed: {e}", checkpoint, address);
                false
            }
        };

        self.schedule_next(&key, id);
        Ok(BeginOutcome::Started { initial_sent })
    }

    /// Tear down the chain for this key. Returns whether one existed.
    pub fn cancel(&self, address: &str, checkpoint: Checkpoint) -> bool {
        let removed = self.chains().remove(&(address.to_string(), checkpoint));
        match removed {
            Some(chain) => {
                chain.handle.cancel();
                tracing::info!(
                    "🛑 {} chain cancelled for {} after {} follow-up(s)",
                    checkpoint,
                    address,
                    chain.step
                );
                true
            }
            None => false,
        }
    }

    /// Cancel both checkpoints for a recipient. Returns chains cancelled.
    pub fn cancel_recipient(&self, address: &str) -> usize {
        Checkpoint::ALL
            .iter()
            .filter(|cp| self.cancel(address, **cp))
            .count()
    }

    /// Abandon every live chain. Used by the daily reset and on shutdown.
    pub fn clear_all(&self) -> usize {
        let drained: Vec<Chain> = self.chains().drain().map(|(_, c)| c).collect();
        for chain in &drained {
            chain.handle.cancel();
        }
        if !drained.is_empty() {
            tracing::info!("🧹 Cleared {} active chain(s)", drained.len());
        }
        drained.len()
    }

    pub fn is_active(&self, address: &str, checkpoint: Checkpoint) -> bool {
        self.chains()
            .contains_key(&(address.to_string(), checkpoint))
    }

    pub fn active_count(&self) -> usize {
        self.chains().len()
    }

    pub fn active_chains(&self) -> Vec<ChainStatus> {
        let mut out: Vec<ChainStatus> = self
            .chains()
            .iter()
            .map(|((address, checkpoint), c)| ChainStatus {
                address: address.clone(),
                name: c.name.clone(),
                checkpoint: *checkpoint,
                date: c.date,
                started_at: format_hhmm(c.started_at),
                followups_sent: c.step,
                cap: c.cap,
                total: self.total_for(c.cap),
            })
            .collect();
        out.sort_by(|a, b| (&a.address, a.checkpoint).cmp(&(&b.address, b.checkpoint)));
        out
    }

    /// Record an acknowledgment for the current effective date and stop the chain.
    pub fn acknowledge(&self, address: &str, checkpoint: Checkpoint, method: AckMethod) -> Result<Acknowledgment> {
        let now = self.clock.now();
        let ack = self
            .directory
            .record_acknowledgment(address, now.date, checkpoint, method, now.time)?;
        self.cancel(address, checkpoint);
        tracing::info!(
            "✅ {} acknowledged {} at {} ({})",
            address,
            checkpoint,
            format_hhmm(ack.acknowledged_at),
            ack.method.as_str()
        );
        Ok(ack)
    }

    // ─── Chain mechanics ─────────────────────────────────────

    /// Send one message, bounded by the per-send timeout. Fails fast with
    /// `NotReady` when the gateway is down.
    pub async fn deliver(&self, address: &str, body: &str) -> Result<()> {
        if !self.gateway.is_ready() {
            return Err(RollcallError::NotReady);
        }
        tokio::time::timeout(self.send_timeout, self.gateway.send(address, body))
            .await
            .map_err(|_| RollcallError::Timeout(self.send_timeout))?
    }

    fn notify_listeners(&self, address: &str, checkpoint: Checkpoint) {
        let listeners: Vec<ReminderListener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener(address, checkpoint);
        }
    }

    /// Arm the timer for the next follow-up, or end the chain if the cap or
    /// the backoff sequence is exhausted.
    fn schedule_next(self: &Arc<Self>, key: &ChainKey, id: u64) {
        let mut chains = self.chains();
        let Some(chain) = chains.get_mut(key) else {
            return;
        };
        if chain.id != id {
            return;
        }

        let total = self.total_for(chain.cap);
        if chain.step >= total {
            chains.remove(key);
            tracing::info!("🏁 {} chain for {} finished after {} follow-up(s)", key.1, key.0, total);
            return;
        }

        let minutes = self.backoff[chain.step as usize];
        let delay = self.delay_for(minutes);
        let engine = Arc::clone(self);
        let fire_key = key.clone();
        chain.handle = self
            .timers
            .schedule(delay, async move { engine.fire(fire_key, id).await }.boxed());
        tracing::debug!(
            "⏰ {} follow-up #{} for {} in {} min ({:?} real)",
            key.1,
            chain.step + 1,
            key.0,
            minutes,
            delay
        );
    }

    /// End the chain from inside its own timer callback.
    fn finish(&self, key: &ChainKey, id: u64, reason: &str) {
        let mut chains = self.chains();
        if chains.get(key).is_some_and(|c| c.id == id) {
            chains.remove(key);
            tracing::info!("🛑 {} chain for {} stopped: {}", key.1, key.0, reason);
        }
    }

    async fn fire(self: Arc<Self>, key: ChainKey, id: u64) {
        let snapshot = {
            let chains = self.chains();
            match chains.get(&key) {
                Some(c) if c.id == id => Some((c.date, c.name.clone(), c.cap, c.step)),
                _ => None,
            }
        };
        let Some((date, name, cap, step)) = snapshot else {
            return;
        };
        let (address, checkpoint) = (key.0.as_str(), key.1);

        match self.directory.acknowledgment(address, date, checkpoint) {
            Ok(Some(_)) => return self.finish(&key, id, "acknowledged"),
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠️ Acknowledgment check for {} failed: {e}", address),
        }
        match self.directory.is_exempt(address, date) {
            Ok(true) => return self.finish(&key, id, "exempt"),
            Ok(false) => {}
            Err(e) => tracing::warn!("⚠️ Exemption check for {} failed: {e}", address),
        }
        match self.directory.recipient(address) {
            Ok(Some(r)) if r.active => {}
            Ok(_) => return self.finish(&key, id, "paused or removed"),
            Err(e) => tracing::warn!("⚠️ Recipient lookup for {} failed: {e}", address),
        }

        let count = step + 1;
        let total = self.total_for(cap);
        let next_minutes = if count >= total {
            None
        } else {
            self.backoff.get(count as usize).copied()
        };
        let tier = Tier::for_followup(count);
        let body = self.formatter.render(
            tier,
            checkpoint,
            &name,
            &Progress { count, total, next_minutes },
        );

        match self.deliver(address, &body).await {
            Ok(()) => {
                tracing::info!(
                    "🔔 {} follow-up {}/{} ({:?}) sent to {}",
                    checkpoint,
                    count,
                    total,
                    tier,
                    address
                );
                self.notify_listeners(address, checkpoint);
            }
            Err(e) => tracing::warn!(
                "⚠️ {} follow-up {}/{} to {} failed: {e}",
                checkpoint,
                count,
                total,
                address
            ),
        }

        {
            let mut chains = self.chains();
            match chains.get_mut(&key) {
                Some(c) if c.id == id => c.step = count,
                _ => return,
            }
        }
        self.schedule_next(&key, id);
    }
}
