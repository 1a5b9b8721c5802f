pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::quiz::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Player API
        .route("/api/v1/quiz/today", get(handlers::handle_today))
        .route("/api/v1/quiz/:date_key", get(handlers::handle_get_question))
        .route(
            "/api/v1/quiz/:date_key/answer",
            post(handlers::handle_submit_answer),
        )
        .route("/api/v1/progress", get(handlers::handle_get_progress))
        .route(
            "/api/v1/leaderboard/:period_key",
            get(handlers::handle_get_leaderboard),
        )
        // Admin API
        .route(
            "/api/v1/admin/schedule",
            post(handlers::handle_assign_question),
        )
        .route("/api/v1/admin/repair", post(handlers::handle_repair))
        .route(
            "/api/v1/admin/catalog/reload",
            post(handlers::handle_reload_catalog),
        )
        .with_state(state)
}
