//! Ollama client for text generation with retry logic

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::{SamplingParams, TextGenerator};

/// Upper bound on the wait between retries
const MAX_BACKOFF_SECS: u64 = 60;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Maximum retries
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    raw: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, params: &'a SamplingParams) -> Self {
        Self {
            model: &params.model,
            prompt,
            stream: false,
            raw: params.raw,
            options: GenerateOptions {
                num_predict: params.max_new_tokens,
                temperature: params.temperature,
                top_k: params.top_k,
                top_p: params.top_p,
            },
        }
    }
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::llm("Unknown error")))
    }
}

/// `2^attempt` seconds, capped at `MAX_BACKOFF_SECS`
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        tracing::info!(
            "Generating with model: {} (max {} tokens)",
            params.model,
            params.max_new_tokens
        );

        self.retry_request(|| {
            let url = url.clone();
            let client = self.client.clone();
            let request = GenerateRequest::new(prompt, params);

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::llm(format!(
                        "Generation failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let generate_response: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

                Ok(generate_response.response)
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SamplingParams {
        SamplingParams {
            model: "llama2".to_string(),
            max_new_tokens: 50,
            temperature: None,
            top_k: None,
            top_p: None,
            raw: true,
        }
    }

    fn unreachable_config() -> LlmConfig {
        LlmConfig {
            base_url: "http://127.0.0.1:1/".to_string(),
            max_retries: 0,
            timeout_secs: 2,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_request_omits_unset_options() {
        let params = params();
        let body = serde_json::to_value(GenerateRequest::new("Hello", &params)).unwrap();

        assert_eq!(body["model"], "llama2");
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["raw"], true);
        assert_eq!(body["options"], serde_json::json!({ "num_predict": 50 }));
    }

    #[test]
    fn test_request_carries_sampling_options() {
        let params = SamplingParams {
            temperature: Some(0.7),
            top_k: Some(50),
            top_p: Some(0.9),
            raw: false,
            ..params()
        };
        let body = serde_json::to_value(GenerateRequest::new("q", &params)).unwrap();

        assert_eq!(body["options"]["top_k"], 50);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((body["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff_delay(64), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_llm_error() {
        let client = OllamaClient::new(&unreachable_config()).unwrap();
        let result = client.generate("Hello", &params()).await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }

    #[tokio::test]
    async fn test_health_check_reports_unreachable() {
        let client = OllamaClient::new(&unreachable_config()).unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
