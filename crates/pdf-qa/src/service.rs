//! Question answering over the configured document set
//!
//! Every QA request obtains a vector store over all documents, retrieves the
//! closest chunks for the question and hands them to one of the answerers.
//! With the shared index policy the store is built once and rebuilt only when
//! the corpus fingerprint changes; with the per-request policy every request
//! re-extracts, re-chunks and re-embeds all documents.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::answering::{ExtractiveAnswer, ExtractiveAnswerer, ExtractiveModel, GenerativeAnswerer};
use crate::config::{IndexPolicy, QaConfig};
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::generation::{SamplingParams, TextGenerator};
use crate::ingestion::{corpus_fingerprint, DocumentChunks, PageSource, WindowChunker};
use crate::retrieval::PdfVectorStore;

/// Generated tokens for `/generate` when the request does not say
pub const DEFAULT_COMPLETION_LENGTH: usize = 50;

/// Loaded models and document access the service is built from
#[derive(Clone)]
pub struct Models {
    /// Page text extraction
    pub pages: Arc<dyn PageSource>,
    /// Chunk and query embeddings
    pub embedder: Arc<dyn Embedder>,
    /// Span extraction
    pub extractive: Arc<dyn ExtractiveModel>,
    /// Free-text generation
    pub generator: Arc<dyn TextGenerator>,
}

/// Shared store and the corpus version it was built from
struct CachedStore {
    fingerprint: String,
    store: Arc<PdfVectorStore>,
}

/// QA request handler
pub struct QaService {
    config: QaConfig,
    chunker: WindowChunker,
    pages: Arc<dyn PageSource>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    extractive: ExtractiveAnswerer,
    generative: GenerativeAnswerer,
    /// Held across a rebuild so concurrent first requests build once
    shared: Mutex<Option<CachedStore>>,
    index_builds: AtomicUsize,
}

impl QaService {
    /// Create the service. Fails on invalid configuration.
    pub fn new(config: QaConfig, models: Models) -> Result<Self> {
        config.validate()?;
        let chunker = WindowChunker::from_config(&config.chunking)?;

        let answer_params = SamplingParams {
            model: config.llm.answer_model.clone(),
            max_new_tokens: config.llm.max_new_tokens,
            temperature: Some(config.llm.temperature),
            top_k: Some(config.llm.top_k),
            top_p: None,
            raw: true,
        };

        Ok(Self {
            chunker,
            pages: models.pages,
            embedder: models.embedder,
            extractive: ExtractiveAnswerer::new(models.extractive),
            generative: GenerativeAnswerer::new(Arc::clone(&models.generator), answer_params),
            generator: models.generator,
            shared: Mutex::new(None),
            index_builds: AtomicUsize::new(0),
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Number of times a vector store was built
    pub fn index_builds(&self) -> usize {
        self.index_builds.load(Ordering::Relaxed)
    }

    /// A vector store over the current document set, following the index policy
    pub async fn vector_store(&self) -> Result<Arc<PdfVectorStore>> {
        match self.config.retrieval.index_policy {
            IndexPolicy::PerRequest => self.build_store().await,
            IndexPolicy::Shared => {
                let mut shared = self.shared.lock().await;

                let paths = self.config.documents.paths.clone();
                let fingerprint =
                    tokio::task::spawn_blocking(move || corpus_fingerprint(&paths)).await??;

                if let Some(cached) = shared.as_ref() {
                    if cached.fingerprint == fingerprint {
                        return Ok(Arc::clone(&cached.store));
                    }
                    tracing::info!("Documents changed, rebuilding shared index");
                }

                let store = self.build_store().await?;
                *shared = Some(CachedStore {
                    fingerprint,
                    store: Arc::clone(&store),
                });

                Ok(store)
            }
        }
    }

    /// Extract, chunk and embed every document into a fresh store
    async fn build_store(&self) -> Result<Arc<PdfVectorStore>> {
        let paths: Vec<PathBuf> = self.config.documents.paths.clone();
        let pages = Arc::clone(&self.pages);
        let embedder = Arc::clone(&self.embedder);
        let chunker = self.chunker;

        let store = tokio::task::spawn_blocking(move || -> Result<PdfVectorStore> {
            let mut store = PdfVectorStore::new(embedder);

            for path in &paths {
                let document = DocumentChunks::load(pages.as_ref(), path, chunker)?;
                let chunks = document.to_vec();
                tracing::debug!(
                    "{}: {} pages, {} chunks",
                    path.display(),
                    document.page_count(),
                    chunks.len()
                );
                store.add_documents(chunks)?;
            }

            Ok(store)
        })
        .await??;

        let builds = self.index_builds.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            "Built vector store: {} chunks from {} documents (build #{})",
            store.len(),
            self.config.documents.paths.len(),
            builds
        );

        Ok(Arc::new(store))
    }

    /// The `retrieval.top_k` chunks closest to `question`
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let store = self.vector_store().await?;
        let question = question.to_string();
        let top_k = self.config.retrieval.top_k;

        let chunks =
            tokio::task::spawn_blocking(move || store.search(&question, top_k)).await??;
        tracing::debug!("Retrieved {} chunks", chunks.len());

        Ok(chunks)
    }

    /// Retrieve and extract an answer span
    pub async fn answer_extractive(&self, question: &str) -> Result<ExtractiveAnswer> {
        let chunks = self.retrieve(question).await?;
        if chunks.is_empty() {
            return Err(Error::NoContext);
        }

        let answerer = self.extractive.clone();
        let question = question.to_string();
        tokio::task::spawn_blocking(move || answerer.answer(&question, &chunks)).await?
    }

    /// Retrieve and generate a free-text answer
    pub async fn answer_generative(
        &self,
        question: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<String> {
        let chunks = self.retrieve(question).await?;
        if chunks.is_empty() {
            return Err(Error::NoContext);
        }

        self.generative.answer(question, &chunks, max_new_tokens).await
    }

    /// Plain continuation of `prompt`, no retrieval. Returns the prompt
    /// followed by the generated text. `max_length` bounds the new tokens
    /// only; the prompt does not count against it.
    pub async fn complete(&self, prompt: &str, max_length: Option<usize>) -> Result<String> {
        let params = SamplingParams {
            model: self.config.llm.completion_model.clone(),
            max_new_tokens: max_length.unwrap_or(DEFAULT_COMPLETION_LENGTH),
            temperature: None,
            top_k: Some(self.config.llm.top_k),
            top_p: Some(self.config.llm.top_p),
            raw: true,
        };

        let continuation = self.generator.generate(prompt, &params).await?;
        Ok(format!("{}{}", prompt, continuation))
    }

    /// Build the shared index ahead of the first request
    pub async fn warm_up(&self) -> Result<()> {
        let store = self.vector_store().await?;
        tracing::info!("Index warm: {} chunks", store.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HashEmbedder, ScriptedGenerator, ScriptedQaModel, TextFilePages};
    use std::path::Path;

    const ARCH: &str = "The G0.5 core has a 64-bit data bus.\x0cCache lines are 64 bytes.";
    const EXHIBITS: &str = "Exhibit A lists the pricing schedule.";

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: Vec<PathBuf>,
        generator: Arc<ScriptedGenerator>,
        service: QaService,
    }

    fn write(path: &Path, text: &str) {
        std::fs::write(path, text).unwrap();
    }

    fn fixture(policy: IndexPolicy) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("arch.txt"), dir.path().join("exhibits.txt")];
        write(&paths[0], ARCH);
        write(&paths[1], EXHIBITS);

        let mut config = QaConfig::default();
        config.documents.paths = paths.clone();
        config.chunking.chunk_size = 40;
        config.chunking.overlap = 5;
        config.retrieval.top_k = 2;
        config.retrieval.index_policy = policy;

        let generator = Arc::new(ScriptedGenerator::new(" It is 64 bits wide."));
        let models = Models {
            pages: Arc::new(TextFilePages),
            embedder: Arc::new(HashEmbedder::new(32)),
            extractive: Arc::new(
                ScriptedQaModel::new()
                    .with("data bus", "64-bit", 0.8)
                    .with("Cache", "64 bytes", 0.4)
                    .with("Exhibit", "pricing schedule", 0.3),
            ),
            generator: generator.clone(),
        };

        let service = QaService::new(config, models).unwrap();
        Fixture {
            _dir: dir,
            paths,
            generator,
            service,
        }
    }

    #[tokio::test]
    async fn test_shared_index_is_reused() {
        let f = fixture(IndexPolicy::Shared);

        f.service.retrieve("bus").await.unwrap();
        f.service.retrieve("cache").await.unwrap();

        assert_eq!(f.service.index_builds(), 1);
    }

    #[tokio::test]
    async fn test_shared_index_rebuilt_after_document_change() {
        let f = fixture(IndexPolicy::Shared);
        f.service.warm_up().await.unwrap();

        write(&f.paths[1], "Exhibit B replaces the pricing schedule entirely.");
        f.service.retrieve("pricing").await.unwrap();
        f.service.retrieve("pricing").await.unwrap();

        assert_eq!(f.service.index_builds(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_build_once() {
        let f = fixture(IndexPolicy::Shared);

        let (a, b) = tokio::join!(f.service.retrieve("bus"), f.service.retrieve("cache"));
        a.unwrap();
        b.unwrap();

        assert_eq!(f.service.index_builds(), 1);
    }

    #[tokio::test]
    async fn test_per_request_rebuilds_every_time() {
        let f = fixture(IndexPolicy::PerRequest);

        f.service.retrieve("bus").await.unwrap();
        f.service.retrieve("bus").await.unwrap();

        assert_eq!(f.service.index_builds(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_returns_top_k() {
        let f = fixture(IndexPolicy::Shared);
        let exact = "Exhibit A lists the pricing schedule.";

        let chunks = f.service.retrieve(exact).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], exact);
    }

    #[tokio::test]
    async fn test_extractive_answer_from_retrieved_chunks() {
        let f = fixture(IndexPolicy::Shared);
        let answer = f
            .service
            .answer_extractive("The G0.5 core has a 64-bit data bus.")
            .await
            .unwrap();

        assert_eq!(answer.answer, "64-bit");
    }

    #[tokio::test]
    async fn test_generative_answer_is_trimmed_continuation() {
        let f = fixture(IndexPolicy::Shared);
        let answer = f.service.answer_generative("How wide is the bus?", None).await.unwrap();

        assert_eq!(answer, "It is 64 bits wide.");
        let calls = f.generator.calls();
        assert_eq!(calls[0].1.max_new_tokens, 256);
        assert_eq!(calls[0].1.model, "llama2");
        assert!(calls[0].0.ends_with("Question: How wide is the bus?\nAnswer:\n"));
    }

    #[tokio::test]
    async fn test_complete_prepends_prompt() {
        let f = fixture(IndexPolicy::Shared);
        let text = f.service.complete("The bus", None).await.unwrap();

        assert_eq!(text, "The bus It is 64 bits wide.");
        assert_eq!(f.generator.calls()[0].1.max_new_tokens, DEFAULT_COMPLETION_LENGTH);
        assert_eq!(f.service.index_builds(), 0);
    }

    #[tokio::test]
    async fn test_missing_document_fails_request() {
        let f = fixture(IndexPolicy::PerRequest);
        std::fs::remove_file(&f.paths[0]).unwrap();

        let result = f.service.retrieve("bus").await;
        assert!(matches!(result, Err(Error::Pdf { .. })));
    }

    #[tokio::test]
    async fn test_blank_documents_give_no_context() {
        let f = fixture(IndexPolicy::PerRequest);
        write(&f.paths[0], "");
        write(&f.paths[1], "");

        let result = f.service.answer_extractive("anything").await;
        assert!(matches!(result, Err(Error::NoContext)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let f = fixture(IndexPolicy::Shared);
        let mut config = f.service.config().clone();
        config.chunking.overlap = config.chunking.chunk_size;

        let models = Models {
            pages: Arc::new(TextFilePages),
            embedder: Arc::new(HashEmbedder::new(8)),
            extractive: Arc::new(ScriptedQaModel::new()),
            generator: f.generator.clone(),
        };
        assert!(matches!(QaService::new(config, models), Err(Error::Config(_))));
    }
}
