pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::jobs::handlers as jobs;
use crate::state::AppState;
use crate::translation::handlers as translation;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Translation API
        .route("/api/v1/translate", post(translation::handle_translate))
        .route(
            "/api/v1/translate/batch",
            post(translation::handle_translate_batch),
        )
        // Assistant chat
        .route("/api/v1/chat", post(chat::handle_chat))
        // Job board
        .route("/api/v1/jobs", get(jobs::handle_search_jobs))
        .with_state(state)
}
