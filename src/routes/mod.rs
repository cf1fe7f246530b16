pub mod admin;
pub mod health;
pub mod quiz;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/generate_quiz", post(quiz::generate_quiz))
        .route("/analyze", post(quiz::analyze))
        .route("/admin/reload", post(admin::reload))
        .route("/admin/cancel", post(admin::cancel))
        .with_state(state)
}
