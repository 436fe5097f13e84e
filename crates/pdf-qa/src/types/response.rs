//! Response body of the generation and QA routes

use serde::{Deserialize, Serialize};

/// `{response}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptResponse {
    /// Generated text or answer
    pub response: String,
}

impl PromptResponse {
    /// Wrap a response text
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
