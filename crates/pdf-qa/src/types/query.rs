//! Request body shared by the generation and QA routes

use serde::{Deserialize, Serialize};

/// `{prompt, max_length}` body of `/generate`, `/query` and `/queryllm`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Prompt to continue, or the question to answer
    #[serde(default)]
    pub prompt: String,

    /// Generated token budget. Each route picks its own default.
    #[serde(default)]
    pub max_length: Option<usize>,
}
