//! HTTP request handlers
//!
//! Session endpoints forward to the orchestrator and answer with the
//! resulting [`SessionSnapshot`]. Errors are mapped to a status code plus a
//! `{ "status": "error: ..." }` body.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::server::{AdminInfo, AppContext};
use crate::error::KioskError;
use crate::events::KioskEvent;
use crate::identity::IdentityMethod;
use crate::session::{LastOutcome, Mode, ResultAction, SessionSnapshot};

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MethodRequest {
    pub method: IdentityMethod,
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub method: IdentityMethod,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: ResultAction,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct LastOutcomeResponse {
    pub last_outcome: Option<LastOutcome>,
    pub summary: Option<String>,
    /// Recording time in the configured display offset, `—` when none
    pub display_time: String,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub mode: Mode,
    pub settings: AdminInfo,
    pub last_outcome: Option<LastOutcome>,
    pub sse_subscribers: usize,
}

fn status(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: message.into(),
        }),
    )
}

fn error_response(e: KioskError) -> ApiError {
    let code = match &e {
        KioskError::InvalidIdentity => StatusCode::UNPROCESSABLE_ENTITY,
        KioskError::InvalidState(_) => StatusCode::CONFLICT,
        KioskError::OrchestratorStopped => StatusCode::SERVICE_UNAVAILABLE,
        KioskError::AccessDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    debug!("Request failed ({}): {}", code, e);
    status(code, format!("error: {}", e))
}

fn reply(result: crate::error::Result<SessionSnapshot>) -> ApiResult<SessionSnapshot> {
    result.map(Json).map_err(error_response)
}

// ============================================================================
// Session Endpoints
// ============================================================================

/// GET /session
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.orchestrator.snapshot())
}

/// POST /session/method
pub async fn choose_method(
    State(ctx): State<AppContext>,
    Json(req): Json<MethodRequest>,
) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.choose_method(req.method).await)
}

/// POST /session/back
pub async fn back(State(ctx): State<AppContext>) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.back().await)
}

/// POST /session/identity
///
/// 422 when the value is empty after trimming; the session stays put.
pub async fn submit_identity(
    State(ctx): State<AppContext>,
    Json(req): Json<IdentityRequest>,
) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.submit_identity(req.method, req.value).await)
}

/// POST /session/scan
pub async fn start_scan(State(ctx): State<AppContext>) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.start_scan().await)
}

/// POST /session/action
pub async fn result_action(
    State(ctx): State<AppContext>,
    Json(req): Json<ActionRequest>,
) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.result_action(req.action).await)
}

/// POST /session/mode
pub async fn set_mode(
    State(ctx): State<AppContext>,
    Json(req): Json<ModeRequest>,
) -> ApiResult<SessionSnapshot> {
    reply(ctx.orchestrator.set_mode(req.mode).await)
}

/// GET /session/last
pub async fn last_outcome(State(ctx): State<AppContext>) -> Json<LastOutcomeResponse> {
    let last_outcome = ctx.orchestrator.snapshot().last_outcome;
    let display_time = rollcall_common::time::format_clock_or_dash(
        last_outcome.as_ref().map(|last| &last.recorded_at),
        &ctx.display_offset,
        true,
    );

    Json(LastOutcomeResponse {
        summary: last_outcome.as_ref().map(|last| last.outcome.summary()),
        last_outcome,
        display_time,
    })
}

// ============================================================================
// Admin Gate
// ============================================================================

/// POST /admin/unlock
pub async fn admin_unlock(
    State(ctx): State<AppContext>,
    Json(req): Json<UnlockRequest>,
) -> ApiResult<StatusResponse> {
    let unlocked = ctx.gate.lock().await.try_unlock(&req.pin);
    if !unlocked {
        return Err(status(StatusCode::UNAUTHORIZED, "error: invalid PIN"));
    }

    ctx.orchestrator.events().emit_lossy(KioskEvent::GateChanged {
        unlocked: true,
        timestamp: rollcall_common::time::now(),
    });

    Ok(Json(StatusResponse {
        status: "unlocked".to_string(),
    }))
}

/// POST /admin/lock
///
/// Leaving the admin view always re-locks.
pub async fn admin_lock(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let was_unlocked = {
        let mut gate = ctx.gate.lock().await;
        let was_unlocked = gate.is_unlocked();
        gate.lock();
        was_unlocked
    };

    if was_unlocked {
        ctx.orchestrator.events().emit_lossy(KioskEvent::GateChanged {
            unlocked: false,
            timestamp: rollcall_common::time::now(),
        });
    }

    Json(StatusResponse {
        status: "locked".to_string(),
    })
}

/// GET /admin
pub async fn admin_view(State(ctx): State<AppContext>) -> ApiResult<AdminResponse> {
    if !ctx.gate.lock().await.is_unlocked() {
        return Err(error_response(KioskError::AccessDenied));
    }

    info!("Admin view opened");
    let snapshot = ctx.orchestrator.snapshot();

    Ok(Json(AdminResponse {
        mode: snapshot.mode,
        settings: (*ctx.admin_info).clone(),
        last_outcome: snapshot.last_outcome,
        sse_subscribers: ctx.orchestrator.events().subscriber_count(),
    }))
}
