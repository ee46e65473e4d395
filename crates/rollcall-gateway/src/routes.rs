//! API route handlers for the gateway.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use rollcall_core::traits::Directory;
use rollcall_core::types::{AckMethod, Checkpoint, Role};
use rollcall_scheduler::BeginOutcome;
use serde_json::{Value, json};

use crate::server::AppState;

fn fail(error: impl std::fmt::Display) -> Json<Value> {
    Json(json!({"ok": false, "error": error.to_string()}))
}

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str, Json<Value>> {
    body[field]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fail(format!("'{field}' is required")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, Json<Value>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| fail(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Health check: 503 until the dispatch gateway is connected.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let clock = state.scanner.clock();
    let now = clock.now();
    let gateway = state.scanner.escalation().gateway();
    let ready = gateway.is_ready();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if ready { "healthy" } else { "unhealthy" },
            "service": "rollcall",
            "version": env!("CARGO_PKG_VERSION"),
            "gateway": gateway.name(),
            "gateway_ready": ready,
            "time": now.hhmm(),
            "date": now.date.to_string(),
            "simulated": clock.is_simulated(),
            "speed": clock.speed_multiplier(),
            "uptime_secs": state.start_time.elapsed().as_secs(),
            "active_chains": state.scanner.escalation().active_count(),
        })),
    )
}

/// Live escalation chains and periodic job schedule.
pub async fn list_chains(State(state): State<Arc<AppState>>) -> Json<Value> {
    let chains = state.scanner.escalation().active_chains();
    Json(json!({
        "ok": true,
        "count": chains.len(),
        "chains": chains,
        "jobs": state.scanner.job_statuses(),
    }))
}

/// Record an acknowledgment and stop the matching chain.
///
/// Body: `{"address", "checkpoint"?, "method"?: "self" | "operator"}`. Without
/// a checkpoint the one most recently reminded about is used. Self-reported
/// acknowledgments count against the per-sender rate limit.
pub async fn acknowledge(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    let address = match required_str(&body, "address") {
        Ok(a) => a,
        Err(e) => return e,
    };
    let method = AckMethod::parse(body["method"].as_str().unwrap_or("self"));

    match state.directory.recipient(address) {
        Ok(Some(_)) => {}
        Ok(None) => return fail(format!("Unknown recipient {address}")),
        Err(e) => return fail(e),
    }

    if method == AckMethod::SelfReported {
        let limit = &state.config.rate_limit;
        match state
            .directory
            .check_rate_limit(address, limit.max_messages, limit.window_secs)
        {
            Ok(true) => {}
            Ok(false) => return fail("Rate limit exceeded, try again later"),
            Err(e) => return fail(e),
        }
    }

    let checkpoint = match body["checkpoint"].as_str() {
        Some(raw) => match raw.parse::<Checkpoint>() {
            Ok(cp) => cp,
            Err(e) => return fail(e),
        },
        None => match state.last_reminded(address) {
            Some(cp) => cp,
            None => return fail("'checkpoint' is required (no recent reminder)"),
        },
    };

    match state.scanner.escalation().acknowledge(address, checkpoint, method) {
        Ok(ack) => Json(json!({"ok": true, "acknowledgment": ack})),
        Err(e) => fail(e),
    }
}

/// Start a chain now, regardless of the scheduled time.
pub async fn trigger(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    let (address, raw_cp) = match (required_str(&body, "address"), required_str(&body, "checkpoint")) {
        (Ok(a), Ok(c)) => (a, c),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let checkpoint = match raw_cp.parse::<Checkpoint>() {
        Ok(cp) => cp,
        Err(e) => return fail(e),
    };
    let recipient = match state.directory.recipient(address) {
        Ok(Some(r)) if r.active => r,
        Ok(Some(_)) => return fail(format!("{address} is paused")),
        Ok(None) => return fail(format!("Unknown recipient {address}")),
        Err(e) => return fail(e),
    };
    let today = state.scanner.clock().now().date;
    match state.directory.is_exempt(address, today) {
        Ok(false) => {}
        Ok(true) => return fail(format!("{address} is exempt on {today}")),
        Err(e) => return fail(e),
    }

    tracing::info!("▶️ Manual trigger: {} {}", address, checkpoint);
    match state.scanner.escalation().begin(&recipient, checkpoint).await {
        Ok(outcome) => Json(json!({
            "ok": matches!(outcome, BeginOutcome::Started { .. }),
            "outcome": outcome,
        })),
        Err(e) => fail(e),
    }
}

pub async fn list_recipients(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.directory.list_recipients() {
        Ok(list) => Json(json!({"ok": true, "count": list.len(), "recipients": list})),
        Err(e) => fail(e),
    }
}

/// Register a recipient with the configured schedule defaults.
///
/// Body: `{"address", "name"?, "role"?, "max_followups"?}`.
pub async fn add_recipient(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    let address = match required_str(&body, "address") {
        Ok(a) => a,
        Err(e) => return e,
    };
    let name = body["name"].as_str().unwrap_or(address);
    let role = Role::parse(body["role"].as_str().unwrap_or("standard"));

    let mut recipient = state.config.schedule.new_recipient(address, name, role);
    if let Some(cap) = body["max_followups"].as_i64() {
        recipient.max_followups = rollcall_core::types::clamp_followups(cap);
    }
    match state.directory.register_recipient(&recipient) {
        Ok(stored) => Json(json!({"ok": true, "recipient": stored})),
        Err(e) => fail(e),
    }
}

pub async fn pause_recipient(State(state): State<Arc<AppState>>, Path(address): Path<String>) -> Json<Value> {
    match state.directory.set_active(&address, false) {
        Ok(found) => {
            let cancelled = state.scanner.escalation().cancel_recipient(&address);
            Json(json!({"ok": found, "cancelled": cancelled}))
        }
        Err(e) => fail(e),
    }
}

pub async fn resume_recipient(State(state): State<Arc<AppState>>, Path(address): Path<String>) -> Json<Value> {
    match state.directory.set_active(&address, true) {
        Ok(found) => Json(json!({"ok": found})),
        Err(e) => fail(e),
    }
}

/// Delete a recipient and everything that hangs off it.
pub async fn remove_recipient(State(state): State<Arc<AppState>>, Path(address): Path<String>) -> Json<Value> {
    let cancelled = state.scanner.escalation().cancel_recipient(&address);
    state
        .last_reminded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&address);
    match state.directory.remove_recipient(&address) {
        Ok(found) => Json(json!({"ok": found, "cancelled": cancelled})),
        Err(e) => fail(e),
    }
}

/// Register a leave. A leave covering today stops running chains.
///
/// Body: `{"address", "start", "end"?, "reason"?}` with `YYYY-MM-DD` dates.
pub async fn add_leave(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    let (address, raw_start) = match (required_str(&body, "address"), required_str(&body, "start")) {
        (Ok(a), Ok(s)) => (a, s),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let start = match parse_date(raw_start) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let end = match body["end"].as_str() {
        Some(raw) => match parse_date(raw) {
            Ok(d) => d,
            Err(e) => return e,
        },
        None => start,
    };
    let reason = body["reason"].as_str().unwrap_or("");

    match state.directory.recipient(address) {
        Ok(Some(_)) => {}
        Ok(None) => return fail(format!("Unknown recipient {address}")),
        Err(e) => return fail(e),
    }
    let leave = match state.directory.add_leave(address, start, end, reason) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let today = state.scanner.clock().now().date;
    let cancelled = if leave.covers(today) {
        state.scanner.escalation().cancel_recipient(address)
    } else {
        0
    };
    Json(json!({"ok": true, "leave": leave, "cancelled": cancelled}))
}

pub async fn cancel_leave(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Json<Value> {
    match state.directory.cancel_leave(id, None) {
        Ok(Some(leave)) => Json(json!({"ok": true, "leave": leave})),
        Ok(None) => fail(format!("No active leave #{id}")),
        Err(e) => fail(e),
    }
}

pub async fn list_holidays(State(state): State<Arc<AppState>>) -> Json<Value> {
    let today = state.scanner.clock().now().date;
    match state.directory.upcoming_holidays(today, 20) {
        Ok(list) => Json(json!({"ok": true, "holidays": list})),
        Err(e) => fail(e),
    }
}

/// Add a local holiday. A holiday today stops every running chain.
///
/// Body: `{"date", "name", "created_by"?}`.
pub async fn add_holiday(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    let (raw_date, name) = match (required_str(&body, "date"), required_str(&body, "name")) {
        (Ok(d), Ok(n)) => (d, n),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let date = match parse_date(raw_date) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let holiday = match state
        .directory
        .add_holiday(date, name, body["created_by"].as_str())
    {
        Ok(h) => h,
        Err(e) => return fail(e),
    };
    let cancelled = if date == state.scanner.clock().now().date {
        tracing::info!("🎉 Holiday added for today, stopping all chains");
        state.scanner.escalation().clear_all()
    } else {
        0
    };
    Json(json!({"ok": true, "holiday": holiday, "cancelled": cancelled}))
}
