//! Free-text generation backends

mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;

use crate::error::Result;

/// Decoding settings for one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Backend model name
    pub model: String,
    /// Upper bound on generated tokens
    pub max_new_tokens: usize,
    /// Sampling temperature, 0 for greedy decoding
    pub temperature: Option<f32>,
    /// Top-k sampling cutoff
    pub top_k: Option<u32>,
    /// Nucleus sampling cutoff
    pub top_p: Option<f32>,
    /// Send the prompt verbatim, without the model's prompt template
    pub raw: bool,
}

/// Trait for text continuation
///
/// Implementations:
/// - `OllamaClient`: local Ollama server (llama2, phi3, etc.)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Continue `prompt`. Returns only the newly generated text.
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
