use axum::{extract::State, response::IntoResponse};

use crate::web::auth::AppState;

use super::templates::DashboardTemplate;

pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    DashboardTemplate {
        connected: state.connection.user_id().is_some(),
        user_id: state.connection.user_id().map(String::from),
        history_enabled: state.history.is_some(),
    }
}
