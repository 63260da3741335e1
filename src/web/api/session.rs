use axum::{extract::State, Json};
use serde::Serialize;

use crate::session::{SessionError, SessionMode, SessionStatus};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};
use crate::web::config::Permission;

/// Outcome of the startup credential exchange.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub enum ConnectionStatus {
    Connected { user_id: String },
    Disconnected { reason: String },
}

impl ConnectionStatus {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Connected { user_id } => Some(user_id),
            ConnectionStatus::Disconnected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub connection: ConnectionStatus,
    pub session: SessionStatus,
}

#[utoipa::path(
    post,
    path = "/api/session/start",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Tracking session started", body = SessionMode),
        (status = 409, description = "No sink connected", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn start(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<SessionMode>> {
    require_permission(&user, Permission::ControlSession)?;
    log::info!("session start requested by {}", user.name);

    let mut session = state.session.lock().await;
    session.start().map_err(map_session_error)?;

    Ok(Json(session.status().mode))
}

#[utoipa::path(
    post,
    path = "/api/session/stop",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Tracking session stopped", body = SessionMode),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn stop(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<SessionMode>> {
    require_permission(&user, Permission::ControlSession)?;
    log::info!("session stop requested by {}", user.name);

    let mut session = state.session.lock().await;
    session.stop().await;

    Ok(Json(session.status().mode))
}

#[utoipa::path(
    get,
    path = "/api/session/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Connection and session status", body = StatusResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<StatusResponse>> {
    require_permission(&user, Permission::ViewStatus)?;

    let session = state.session.lock().await;
    Ok(Json(StatusResponse {
        connection: (*state.connection).clone(),
        session: session.status(),
    }))
}

fn map_session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::NotConnected => ApiError::Conflict("not_connected"),
    }
}
