//! Retrieval-augmented free-text answering

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::{SamplingParams, TextGenerator};

/// Marker the prompt ends with; the answer is whatever follows it
pub const ANSWER_MARKER: &str = "Answer:";

/// Put the retrieved context and the question into the answering prompt
pub fn build_prompt(question: &str, chunks: &[String]) -> String {
    let context = chunks.join("\n");
    format!(
        "You are a helpful assistant. Use the following context to answer the question.\n\
         Context:\n{}\n\nQuestion: {}\n{}\n",
        context, question, ANSWER_MARKER
    )
}

/// Text after the last answer marker, trimmed. Without a marker the text is
/// returned as is.
pub fn extract_answer(generated: &str) -> String {
    match generated.rsplit_once(ANSWER_MARKER) {
        Some((_, answer)) => answer.trim().to_string(),
        None => generated.to_string(),
    }
}

/// Answers with a language model conditioned on the retrieved chunks
#[derive(Clone)]
pub struct GenerativeAnswerer {
    generator: Arc<dyn TextGenerator>,
    params: SamplingParams,
}

impl GenerativeAnswerer {
    /// `params.max_new_tokens` is used when a request does not set its own
    pub fn new(generator: Arc<dyn TextGenerator>, params: SamplingParams) -> Self {
        Self { generator, params }
    }

    /// Default sampling settings
    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Generate an answer to `question` from `chunks`
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[String],
        max_new_tokens: Option<usize>,
    ) -> Result<String> {
        if chunks.is_empty() {
            return Err(Error::NoContext);
        }

        let prompt = build_prompt(question, chunks);
        let mut params = self.params.clone();
        if let Some(max_new_tokens) = max_new_tokens {
            params.max_new_tokens = max_new_tokens;
        }

        let continuation = self.generator.generate(&prompt, &params).await?;
        let generated = format!("{}{}", prompt, continuation);

        let answer = extract_answer(&generated);
        tracing::info!(
            "Generated answer from {} chunks ({} chars, backend {})",
            chunks.len(),
            answer.len(),
            self.generator.name()
        );

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn params() -> SamplingParams {
        SamplingParams {
            model: "llama2".to_string(),
            max_new_tokens: 256,
            temperature: Some(0.7),
            top_k: Some(50),
            top_p: None,
            raw: true,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(
            "What is the bus width?",
            &["first chunk".to_string(), "second chunk".to_string()],
        );
        assert_eq!(
            prompt,
            "You are a helpful assistant. Use the following context to answer the question.\n\
             Context:\nfirst chunk\nsecond chunk\n\nQuestion: What is the bus width?\nAnswer:\n"
        );
    }

    #[test]
    fn test_extract_after_single_marker() {
        assert_eq!(extract_answer("prompt\nAnswer:\n  64 bits \n"), "64 bits");
    }

    #[test]
    fn test_extract_after_last_marker() {
        assert_eq!(
            extract_answer("Answer: first\nQuestion: again\nAnswer: second"),
            "second"
        );
    }

    #[test]
    fn test_extract_without_marker_is_unchanged() {
        assert_eq!(extract_answer("  no marker here \n"), "  no marker here \n");
    }

    #[tokio::test]
    async fn test_answer_uses_continuation() {
        let generator = Arc::new(ScriptedGenerator::new(" 64 bits wide."));
        let answerer = GenerativeAnswerer::new(generator.clone(), params());

        let answer = answerer
            .answer("How wide?", &["The bus is 64 bits wide.".to_string()], None)
            .await
            .unwrap();

        assert_eq!(answer, "64 bits wide.");
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("The bus is 64 bits wide."));
        assert_eq!(calls[0].1.max_new_tokens, 256);
    }

    #[tokio::test]
    async fn test_request_overrides_max_new_tokens() {
        let generator = Arc::new(ScriptedGenerator::new("ok"));
        let answerer = GenerativeAnswerer::new(generator.clone(), params());

        answerer
            .answer("q", &["ctx".to_string()], Some(32))
            .await
            .unwrap();

        assert_eq!(generator.calls()[0].1.max_new_tokens, 32);
    }

    #[tokio::test]
    async fn test_empty_context_is_no_context() {
        let answerer = GenerativeAnswerer::new(Arc::new(ScriptedGenerator::new("x")), params());
        let result = answerer.answer("q", &[], None).await;
        assert!(matches!(result, Err(Error::NoContext)));
    }
}
