//! ONNX extractive question answering
//!
//! Question and context are encoded as a pair. Long contexts overflow into
//! several windows that share `doc_stride` tokens; every window is scored and
//! the best span across all of them is mapped back to the context text.

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tokenizers::{Encoding, Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

use crate::config::ExtractiveConfig;
use crate::error::{Error, Result};
use crate::model_files::ensure_model_files;

use super::{AnswerSpan, ExtractiveModel};

/// Sequence id of the context in a question/context pair
const CONTEXT_SEQUENCE: usize = 1;

/// Extractive QA model running on ONNX Runtime
pub struct OnnxQaModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    name: String,
    /// BERT-style models take segment ids, RoBERTa does not
    needs_token_type_ids: bool,
    max_answer_len: usize,
}

impl OnnxQaModel {
    /// Download (if needed) and load the configured model
    pub async fn new(config: &ExtractiveConfig) -> Result<Self> {
        tracing::info!("Initializing extractive QA model: {}", config.repo);

        let files = ensure_model_files(&config.repo, &config.onnx_file, &config.cache_dir).await?;
        let model = Self::from_files(&files.model, &files.tokenizer, config)?;

        tracing::info!("Extractive QA model initialized successfully");
        Ok(model)
    }

    /// Load from model files already on disk
    pub fn from_files(model_path: &Path, tokenizer_path: &Path, config: &ExtractiveConfig) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| Error::qa(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::qa(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::qa(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| Error::qa(format!("Failed to load model: {}", e)))?;

        let needs_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::qa(format!("Failed to load tokenizer: {}", e)))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_seq_len,
                stride: config.doc_stride,
                strategy: TruncationStrategy::OnlySecond,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| Error::qa(format!("Failed to configure truncation: {}", e)))?;
        tokenizer.with_padding(None);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            name: config.repo.clone(),
            needs_token_type_ids,
            max_answer_len: config.max_answer_len,
        })
    }

    /// Start and end logits for one window
    fn logits(&self, window: &Encoding) -> Result<(Vec<f32>, Vec<f32>)> {
        let len = window.len();
        let ids: Vec<i64> = window.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = window.get_attention_mask().iter().map(|&m| m as i64).collect();

        let tensor = |values: Vec<i64>, what: &str| {
            Tensor::from_array((vec![1, len], values.into_boxed_slice()))
                .map(|t| t.into_dyn())
                .map_err(|e| Error::qa(format!("{} tensor creation failed: {}", what, e)))
        };

        let mut inputs = vec![
            ("input_ids", tensor(ids, "Input")?),
            ("attention_mask", tensor(mask, "Attention mask")?),
        ];
        if self.needs_token_type_ids {
            let types: Vec<i64> = window.get_type_ids().iter().map(|&t| t as i64).collect();
            inputs.push(("token_type_ids", tensor(types, "Token type")?));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::qa(format!("Inference failed: {}", e)))?;

        let extract = |name: &str| -> Result<Vec<f32>> {
            let (_, value) = outputs
                .iter()
                .find(|(output, _)| *output == name)
                .ok_or_else(|| Error::qa(format!("Model has no {} output", name)))?;
            let (_, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::qa(format!("Failed to extract {}: {}", name, e)))?;
            Ok(data.iter().take(len).copied().collect())
        };

        Ok((extract("start_logits")?, extract("end_logits")?))
    }
}

impl ExtractiveModel for OnnxQaModel {
    fn answer(&self, question: &str, context: &str) -> Result<AnswerSpan> {
        let encoding = self
            .tokenizer
            .encode((question, context), true)
            .map_err(|e| Error::qa(format!("Tokenization failed: {}", e)))?;

        let windows = std::iter::once(&encoding).chain(encoding.get_overflowing().iter());

        let mut best: Option<AnswerSpan> = None;

        for window in windows {
            let context_mask: Vec<bool> = window
                .get_sequence_ids()
                .iter()
                .map(|id| *id == Some(CONTEXT_SEQUENCE))
                .collect();

            if !context_mask.iter().any(|&c| c) {
                continue;
            }

            let (start_logits, end_logits) = self.logits(window)?;
            let Some((s, e, score)) =
                best_span(&start_logits, &end_logits, &context_mask, self.max_answer_len)
            else {
                continue;
            };

            if best.as_ref().is_some_and(|b| b.score >= score) {
                continue;
            }

            let offsets = window.get_offsets();
            let (start, end) = trim_span(context, offsets[s].0, offsets[e].1);
            let answer = context.get(start..end).unwrap_or_default().to_string();

            best = Some(AnswerSpan {
                answer,
                score,
                start,
                end,
            });
        }

        Ok(best.unwrap_or(AnswerSpan {
            answer: String::new(),
            score: 0.0,
            start: 0,
            end: 0,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Narrow the byte range `start..end` of `context` to exclude surrounding
/// whitespace. Ranges that are not valid slices collapse to `start..start`.
fn trim_span(context: &str, start: usize, end: usize) -> (usize, usize) {
    let Some(raw) = context.get(start..end) else {
        return (start, start);
    };
    let leading = raw.len() - raw.trim_start().len();
    let start = start + leading;
    (start, start + raw.trim().len())
}

/// Highest scoring `(start, end, p_start * p_end)` over context tokens with
/// `start <= end < start + max_answer_len`. Probabilities are a softmax over
/// the context tokens only.
pub fn best_span(
    start_logits: &[f32],
    end_logits: &[f32],
    context_mask: &[bool],
    max_answer_len: usize,
) -> Option<(usize, usize, f32)> {
    let start_probs = masked_softmax(start_logits, context_mask)?;
    let end_probs = masked_softmax(end_logits, context_mask)?;
    let max_answer_len = max_answer_len.max(1);

    let mut best: Option<(usize, usize, f32)> = None;

    for (s, p_start) in start_probs.iter().enumerate() {
        let Some(p_start) = p_start else { continue };

        let last = (s + max_answer_len).min(end_probs.len());
        for (e, p_end) in end_probs.iter().enumerate().take(last).skip(s) {
            let Some(p_end) = p_end else { continue };

            let score = p_start * p_end;
            if best.map_or(true, |(_, _, b)| score > b) {
                best = Some((s, e, score));
            }
        }
    }

    best
}

/// Softmax over the masked-in positions, `None` elsewhere
fn masked_softmax(logits: &[f32], mask: &[bool]) -> Option<Vec<Option<f32>>> {
    let max = logits
        .iter()
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|(&l, _)| l)
        .fold(None, |acc: Option<f32>, l| Some(acc.map_or(l, |m| m.max(l))))?;

    let exps: Vec<Option<f32>> = logits
        .iter()
        .zip(mask)
        .map(|(&l, &keep)| keep.then(|| (l - max).exp()))
        .collect();
    let sum: f32 = exps.iter().flatten().sum();

    Some(exps.into_iter().map(|e| e.map(|v| v / sum)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_span_picks_peaks() {
        // [CLS] q q [SEP] c c c c [SEP]
        let mask = [false, false, false, false, true, true, true, true, false];
        let start = [9.0, 0.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 9.0];
        let end = [9.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0, 0.0, 9.0];

        let (s, e, score) = best_span(&start, &end, &mask, 15).unwrap();
        assert_eq!((s, e), (5, 6));
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn test_end_never_before_start() {
        let mask = [true, true, true];
        let start = [0.0, 0.0, 8.0];
        let end = [8.0, 0.0, 0.0];

        let (s, e, _) = best_span(&start, &end, &mask, 15).unwrap();
        assert!(e >= s);
    }

    #[test]
    fn test_span_length_limited() {
        let mask = [true; 6];
        let start = [6.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let end = [0.0, 0.0, 0.0, 0.0, 0.0, 6.0];

        let (s, e, _) = best_span(&start, &end, &mask, 2).unwrap();
        assert!(e - s < 2);
    }

    #[test]
    fn test_no_context_tokens() {
        assert_eq!(best_span(&[1.0, 2.0], &[1.0, 2.0], &[false, false], 15), None);
    }

    #[test]
    fn test_trim_span_moves_offsets_with_text() {
        let context = "The bus is 64-bit wide.";
        // Byte-level BPE offsets include the space before a word
        let (start, end) = trim_span(context, 10, 17);
        assert_eq!((start, end), (11, 17));
        assert_eq!(&context[start..end], "64-bit");

        assert_eq!(trim_span(context, 3, 4), (4, 4));
        assert_eq!(trim_span("가나", 1, 3), (1, 1));
        assert_eq!(trim_span(context, 20, 99), (20, 20));
    }

    #[test]
    fn test_masked_softmax_sums_to_one() {
        let probs = masked_softmax(&[1.0, 2.0, 3.0, 100.0], &[true, true, true, false]).unwrap();
        assert_eq!(probs[3], None);
        let total: f32 = probs.iter().flatten().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_missing_model_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxQaModel::from_files(
            &dir.path().join("model.onnx"),
            &dir.path().join("tokenizer.json"),
            &ExtractiveConfig::default(),
        );
        assert!(matches!(result, Err(Error::Qa(_))));
    }
}
