//! Best-chunk extractive answering

use std::sync::Arc;

use crate::error::{Error, Result};

use super::ExtractiveModel;

/// Answer picked across all chunks
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractiveAnswer {
    /// Answer text
    pub answer: String,
    /// Confidence of the winning span
    pub score: f32,
    /// Position of the winning chunk in the input
    pub chunk_index: usize,
}

/// Runs the model on every chunk and keeps the single most confident span
#[derive(Clone)]
pub struct ExtractiveAnswerer {
    model: Arc<dyn ExtractiveModel>,
}

impl ExtractiveAnswerer {
    /// Wrap a model
    pub fn new(model: Arc<dyn ExtractiveModel>) -> Self {
        Self { model }
    }

    /// Each chunk is an independent context. The earliest chunk wins ties.
    pub fn answer(&self, question: &str, chunks: &[String]) -> Result<ExtractiveAnswer> {
        let mut best: Option<ExtractiveAnswer> = None;
        let mut best_score = f32::NEG_INFINITY;

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let span = self.model.answer(question, chunk)?;
            tracing::debug!(
                "Chunk {}: score {:.4} answer {:?}",
                chunk_index,
                span.score,
                span.answer
            );

            if best.is_none() || span.score > best_score {
                best_score = span.score;
                best = Some(ExtractiveAnswer {
                    answer: span.answer,
                    score: span.score,
                    chunk_index,
                });
            }
        }

        let best = best.ok_or(Error::NoContext)?;
        tracing::info!(
            "Extractive answer from chunk {} of {} (score {:.4}, model {})",
            best.chunk_index,
            chunks.len(),
            best.score,
            self.model.name()
        );

        Ok(best)
    }
}
