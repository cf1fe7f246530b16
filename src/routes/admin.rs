use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::services::llm_service::Backends;
use crate::AppState;

/// Rebuilds the backend binding from configuration and clears cancellation.
#[axum::debug_handler]
pub async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    let backends = Backends::from_settings(&state.config.llm, state.http_client.clone());
    state.dispatcher.rebind(backends);
    (StatusCode::OK, Json(state.dispatcher.health()))
}

#[axum::debug_handler]
pub async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    state.dispatcher.cancel();
    (StatusCode::OK, Json(state.dispatcher.health()))
}
