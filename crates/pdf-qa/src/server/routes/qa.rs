//! Generation and question answering routes

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{PromptRequest, PromptResponse};

/// POST /generate - continue the prompt, no retrieval
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>> {
    let Json(request) = payload?;
    let start = Instant::now();

    let text = state
        .service()
        .complete(&request.prompt, request.max_length)
        .await?;

    tracing::info!("Generated {} chars in {:?}", text.len(), start.elapsed());
    Ok(Json(PromptResponse::new(text)))
}

/// POST /query - retrieval plus extractive answering
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>> {
    let Json(request) = payload?;
    let start = Instant::now();

    tracing::info!("Query: \"{}\"", request.prompt);

    let answer = state.service().answer_extractive(&request.prompt).await?;

    tracing::info!(
        "Answered in {:?} (score {:.4})",
        start.elapsed(),
        answer.score
    );
    Ok(Json(PromptResponse::new(answer.answer)))
}

/// POST /queryllm - retrieval plus generative answering
pub async fn query_llm(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>> {
    let Json(request) = payload?;
    let start = Instant::now();

    tracing::info!("LLM query: \"{}\"", request.prompt);

    let answer = state
        .service()
        .answer_generative(&request.prompt, request.max_length)
        .await?;

    tracing::info!("Answered in {:?}", start.elapsed());
    Ok(Json(PromptResponse::new(answer)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::server::build_router;
    use crate::testing::{test_app, TestApp};

    async fn post(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
        post_raw(app, uri, body.to_string()).await
    }

    async fn post_raw(app: &TestApp, uri: &str, body: String) -> (StatusCode, Value) {
        let response = build_router(app.state.clone(), true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generate_returns_prompt_and_continuation() {
        let app = test_app();
        let (status, body) = post(&app, "/generate", json!({ "prompt": "Once upon" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "Once upon a time." }));
        assert_eq!(app.generator.calls()[0].1.max_new_tokens, 50);
    }

    #[tokio::test]
    async fn test_generate_honours_max_length() {
        let app = test_app();
        post(&app, "/generate", json!({ "prompt": "x", "max_length": 12 })).await;
        assert_eq!(app.generator.calls()[0].1.max_new_tokens, 12);
    }

    #[tokio::test]
    async fn test_max_length_counts_new_tokens_only() {
        let app = test_app();
        let prompt = "word ".repeat(200);
        let (status, body) =
            post(&app, "/generate", json!({ "prompt": prompt, "max_length": 12 })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], format!("{} a time.", prompt));
        let calls = app.generator.calls();
        assert_eq!(calls[0].0, prompt);
        assert_eq!(calls[0].1.max_new_tokens, 12);
    }

    #[tokio::test]
    async fn test_query_returns_extractive_answer() {
        let app = test_app();
        let (status, body) = post(
            &app,
            "/query",
            json!({ "prompt": "The G0.5 core has a 64-bit data bus.", "max_length": 50 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "64-bit" }));
    }

    #[tokio::test]
    async fn test_queryllm_returns_generated_answer() {
        let app = test_app();
        let (status, body) = post(&app, "/queryllm", json!({ "prompt": "How wide?" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "a time." }));
        assert_eq!(app.generator.calls()[0].1.max_new_tokens, 256);
    }

    #[tokio::test]
    async fn test_failures_are_json_errors() {
        let app = test_app();
        std::fs::remove_file(&app.paths[0]).unwrap();

        let (status, body) = post(&app, "/query", json!({ "prompt": "bus" })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "pdf_error");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let app = test_app();

        for uri in ["/generate", "/query", "/queryllm"] {
            let (status, body) = post_raw(&app, uri, "not json".to_string()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["type"], "invalid_request");
        }
        assert!(app.generator.calls().is_empty());
    }
}
