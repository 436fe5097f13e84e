//! Liveness and hardware routes

use axum::extract::State;

use crate::server::state::AppState;

/// GET / - liveness check
pub async fn health_check() -> &'static str {
    "LLM server is up and running!"
}

/// GET /checkup - GPU availability and names
pub async fn checkup(State(state): State<AppState>) -> String {
    let summary = state.hardware().probe().await;
    tracing::info!("Hardware checkup: {} GPU(s)", summary.gpu_names.len());
    summary.to_string()
}
