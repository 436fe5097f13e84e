//! Answering questions from retrieved chunks
//!
//! Two variants share the retrieved context:
//! - extractive: picks a literal span out of the best scoring chunk
//! - generative: asks a language model for a free-text answer

mod extractive;
mod generative;
mod onnx_qa;

pub use extractive::{ExtractiveAnswer, ExtractiveAnswerer};
pub use generative::{build_prompt, extract_answer, GenerativeAnswerer, ANSWER_MARKER};
pub use onnx_qa::{best_span, OnnxQaModel};

use crate::error::Result;

/// An answer span found in one context
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSpan {
    /// Answer text, a slice of the context
    pub answer: String,
    /// Model confidence, `p(start) * p(end)`
    pub score: f32,
    /// Byte offset of the answer in the context
    pub start: usize,
    /// Byte offset one past the answer
    pub end: usize,
}

/// Trait for extractive question answering over a single context
///
/// Implementations:
/// - `OnnxQaModel`: ONNX Runtime session (deepset/roberta-base-squad2)
pub trait ExtractiveModel: Send + Sync {
    /// Best answer span for `question` within `context`
    fn answer(&self, question: &str, context: &str) -> Result<AnswerSpan>;

    /// Model name for logging
    fn name(&self) -> &str;
}
