//! Sentence embeddings

mod onnx;

pub use onnx::OnnxEmbedder;

use crate::error::{Error, Result};

/// Trait for turning text into fixed-width vectors
///
/// Implementations:
/// - `OnnxEmbedder`: local ONNX Runtime session (all-MiniLM-L6-v2)
///
/// Inference is CPU bound, so callers on the async runtime go through
/// `spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Embed several texts, one vector per text, in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    /// Width of the produced vectors
    fn dimensions(&self) -> usize;

    /// Model name for logging
    fn name(&self) -> &str;
}
