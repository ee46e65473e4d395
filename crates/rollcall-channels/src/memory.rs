//! In-memory dispatch gateway: records every message instead of sending it.
//! Backs `--dry-run` and the scheduler tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::DispatchGateway;
use serde::Serialize;

/// A message the gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub address: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Outbox gateway with readiness and failure toggles.
pub struct MemoryGateway {
    outbox: Mutex<Vec<SentMessage>>,
    ready: AtomicBool,
    failing: AtomicBool,
    /// Addresses whose sends fail.
    failing_addresses: Mutex<HashSet<String>>,
    /// Addresses whose sends never complete.
    stalled_addresses: Mutex<HashSet<String>>,
    echo: bool,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            failing_addresses: Mutex::new(HashSet::new()),
            stalled_addresses: Mutex::new(HashSet::new()),
            echo: false,
        }
    }

    /// Log every accepted message at info level (dry-run mode).
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// While failing, sends return a dispatch error and are not recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make sends to `address` fail while other addresses keep working.
    pub fn fail_address(&self, address: &str) {
        self.failing_addresses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.to_string());
    }

    /// Make sends to `address` hang forever.
    pub fn stall_address(&self, address: &str) {
        self.stalled_addresses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.to_string());
    }

    fn listed(set: &Mutex<HashSet<String>>, address: &str) -> bool {
        set.lock().unwrap_or_else(|e| e.into_inner()).contains(address)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.address == address)
            .collect()
    }

    pub fn clear(&self) {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl DispatchGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, address: &str, body: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(RollcallError::NotReady);
        }
        if Self::listed(&self.stalled_addresses, address) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) || Self::listed(&self.failing_addresses, address) {
            return Err(RollcallError::Dispatch(format!("simulated failure sending to {address}")));
        }
        if self.echo {
            tracing::info!("📤 [dry-run] → {}\n{}", address, body);
        }
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                address: address.to_string(),
                body: body.to_string(),
                at: Utc::now(),
            });
        Ok(())
    }
}
