//! HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::gate::AccessGate;
use crate::orchestrator::OrchestratorHandle;

/// Static settings shown on the admin view
#[derive(Debug, Clone, Serialize)]
pub struct AdminInfo {
    pub backend_url: String,
    pub snapshot_url: String,
    pub probe_interval_ms: u64,
    pub result_dwell_ms: u64,
}

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub orchestrator: OrchestratorHandle,
    pub gate: Arc<Mutex<AccessGate>>,
    /// Offset used when formatting displayed times
    pub display_offset: FixedOffset,
    pub admin_info: Arc<AdminInfo>,
}

impl AppContext {
    pub fn new(
        orchestrator: OrchestratorHandle,
        gate: AccessGate,
        display_offset: FixedOffset,
        admin_info: AdminInfo,
    ) -> Self {
        Self {
            orchestrator,
            gate: Arc::new(Mutex::new(gate)),
            display_offset,
            admin_info: Arc::new(admin_info),
        }
    }
}

/// Build the router with all routes attached to `ctx`
pub fn build_router(ctx: AppContext) -> Router {
    use super::handlers;

    Router::new()
        .route("/health", get(super::health::health))
        .route("/build_info", get(super::health::build_info))
        // Session control
        .route("/session", get(handlers::get_session))
        .route("/session/method", post(handlers::choose_method))
        .route("/session/back", post(handlers::back))
        .route("/session/identity", post(handlers::submit_identity))
        .route("/session/scan", post(handlers::start_scan))
        .route("/session/action", post(handlers::result_action))
        .route("/session/mode", post(handlers::set_mode))
        .route("/session/last", get(handlers::last_outcome))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        // Admin gate
        .route("/admin", get(handlers::admin_view))
        .route("/admin/unlock", post(handlers::admin_unlock))
        .route("/admin/lock", post(handlers::admin_lock))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the control API until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Kiosk control API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Kiosk control API stopped");
    Ok(())
}
