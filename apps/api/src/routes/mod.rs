pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/interviews/:id/turn", post(handlers::handle_turn))
        .route(
            "/api/v1/interviews/:id/session",
            get(handlers::handle_get_session).delete(handlers::handle_clear_session),
        )
        .route(
            "/api/v1/interviews/:id/feedback",
            post(handlers::handle_finalize_feedback),
        )
        .with_state(state)
}
