//! HTTP server implementation using Axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::{delete, get, post};
use rollcall_core::config::{GatewayConfig, RollcallConfig};
use rollcall_core::types::Checkpoint;
use rollcall_scheduler::{SqliteDirectory, TickScanner};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
pub struct AppState {
    pub config: RollcallConfig,
    pub directory: Arc<SqliteDirectory>,
    pub scanner: Arc<TickScanner>,
    pub start_time: std::time::Instant,
    /// Checkpoint each address was last reminded about. Lets an
    /// acknowledgment without an explicit checkpoint apply to the right one.
    pub last_reminded: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl AppState {
    pub fn new(config: RollcallConfig, directory: Arc<SqliteDirectory>, scanner: Arc<TickScanner>) -> Self {
        let last_reminded: Arc<Mutex<HashMap<String, Checkpoint>>> = Arc::default();
        let sink = last_reminded.clone();
        scanner.escalation().on_reminder_fired(move |address, checkpoint| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(address.to_string(), checkpoint);
        });
        Self {
            config,
            directory,
            scanner,
            start_time: std::time::Instant::now(),
            last_reminded,
        }
    }

    pub fn last_reminded(&self, address: &str) -> Option<Checkpoint> {
        self.last_reminded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .copied()
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/chains", get(super::routes::list_chains))
        .route("/api/v1/acknowledge", post(super::routes::acknowledge))
        .route("/api/v1/trigger", post(super::routes::trigger))
        .route("/api/v1/recipients", get(super::routes::list_recipients))
        .route("/api/v1/recipients", post(super::routes::add_recipient))
        .route("/api/v1/recipients/{address}", delete(super::routes::remove_recipient))
        .route("/api/v1/recipients/{address}/pause", post(super::routes::pause_recipient))
        .route("/api/v1/recipients/{address}/resume", post(super::routes::resume_recipient))
        .route("/api/v1/leaves", post(super::routes::add_leave))
        .route("/api/v1/leaves/{id}", delete(super::routes::cancel_leave))
        .route("/api/v1/holidays", get(super::routes::list_holidays))
        .route("/api/v1/holidays", post(super::routes::add_holiday))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the task is aborted.
pub async fn start(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
