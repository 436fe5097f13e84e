//! Configuration for the QA service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_ENV_VAR: &str = "PDF_QA_CONFIG";

/// Main QA service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Fixed document set
    pub documents: DocumentsConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Extractive QA model configuration
    pub extractive: ExtractiveConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

impl QaConfig {
    /// Load configuration from a TOML file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: QaConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: QaConfig =
            toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `PDF_QA_CONFIG`, or defaults when unset
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(Path::new(&path))
            }
            _ => {
                tracing::info!("{} not set, using default configuration", CONFIG_ENV_VAR);
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Reject settings that would make the pipeline loop or return nothing
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.documents.paths.is_empty() {
            return Err(Error::Config("documents.paths must not be empty".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.extractive.doc_stride >= self.extractive.max_seq_len {
            return Err(Error::Config(format!(
                "extractive.doc_stride ({}) must be smaller than max_seq_len ({})",
                self.extractive.doc_stride, self.extractive.max_seq_len
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS for all origins
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            enable_cors: true,
        }
    }
}

/// The fixed set of PDF documents answered from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// PDF file paths, indexed in this order
    pub paths: Vec<PathBuf>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                PathBuf::from("/app/vectorization/1-G0.5ArchSpecs.pdf"),
                PathBuf::from("/app/vectorization/2-CaliberExhibits.pdf"),
            ],
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window width in characters
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters
    pub overlap: usize,
}

impl ChunkingConfig {
    /// The window must advance on every step
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            overlap: 500,
        }
    }
}

/// Sentence embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// HuggingFace repository of the ONNX sentence-transformers model
    pub repo: String,
    /// Path of the ONNX graph inside the repository
    pub onnx_file: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length in tokens
    pub max_length: usize,
    /// Cache directory for the model files
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            repo: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            onnx_file: "onnx/model.onnx".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: default_cache_dir().join("all-MiniLM-L6-v2"),
        }
    }
}

/// Extractive QA model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractiveConfig {
    /// HuggingFace repository of the ONNX question-answering model
    pub repo: String,
    /// Path of the ONNX graph inside the repository
    pub onnx_file: String,
    /// Tokens per encoded question/context window
    pub max_seq_len: usize,
    /// Tokens shared between consecutive context windows
    pub doc_stride: usize,
    /// Longest answer span in tokens
    pub max_answer_len: usize,
    /// Cache directory for the model files
    pub cache_dir: PathBuf,
}

impl Default for ExtractiveConfig {
    fn default() -> Self {
        Self {
            repo: "deepset/roberta-base-squad2".to_string(),
            onnx_file: "onnx/model.onnx".to_string(),
            max_seq_len: 384,
            doc_stride: 128,
            max_answer_len: 15,
            cache_dir: default_cache_dir().join("roberta-base-squad2"),
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model used for raw continuations (`/generate`)
    pub completion_model: String,
    /// Model used for retrieval-grounded answers (`/queryllm`)
    pub answer_model: String,
    /// Sampling temperature for answers
    pub temperature: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Nucleus sampling cutoff for raw continuations
    pub top_p: f32,
    /// Default number of tokens generated for an answer
    pub max_new_tokens: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            completion_model: "llama2".to_string(),
            answer_model: "llama2".to_string(),
            temperature: 0.7,
            top_k: 50,
            top_p: 0.9,
            max_new_tokens: 256,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// How long a built vector store lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Build once, reuse across requests, rebuild when the documents change
    #[default]
    Shared,
    /// Re-extract, re-chunk and re-embed every document on every request
    PerRequest,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the answerer
    pub top_k: usize,
    /// Vector store lifetime
    pub index_policy: IndexPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            index_policy: IndexPolicy::Shared,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdf-qa")
        .join("models")
}
