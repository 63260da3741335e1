use axum::{extract::State, Json};

use crate::sink::LocationRecord;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};
use crate::web::config::Permission;

#[utoipa::path(
    get,
    path = "/api/history",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Location history, newest first", body = Vec<LocationRecord>),
        (status = 404, description = "Sink variant has no history", body = ErrorResponse),
        (status = 409, description = "Not connected", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "history"
)]
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<LocationRecord>>> {
    require_permission(&user, Permission::ViewHistory)?;

    let store = state
        .history
        .as_ref()
        .ok_or(ApiError::NotFound("history_unavailable"))?;

    let user_id = state
        .connection
        .user_id()
        .ok_or(ApiError::Conflict("not_connected"))?;

    let records = store.list(user_id).await?;
    Ok(Json(records))
}
