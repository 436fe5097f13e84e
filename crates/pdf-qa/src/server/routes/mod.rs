//! Routes of the QA server

pub mod health;
pub mod qa;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::health_check))
        .route("/checkup", get(health::checkup))
        .route("/generate", post(qa::generate))
        .route("/query", post(qa::query))
        .route("/queryllm", post(qa::query_llm))
}
