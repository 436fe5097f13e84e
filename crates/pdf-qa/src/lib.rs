//! pdf-qa: question answering over a fixed set of PDF documents
//!
//! Documents are extracted page by page, cut into overlapping character
//! windows and embedded into an exact L2 index. Questions are answered either
//! extractively (a span from the best retrieved chunk, via an ONNX QA model) or
//! generatively (an Ollama model prompted with the retrieved chunks). An axum
//! server exposes both next to plain text generation.

pub mod answering;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod hardware;
pub mod ingestion;
pub mod model_files;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;

pub use config::QaConfig;
pub use error::{Error, Result};
pub use service::{Models, QaService};
pub use types::{PromptRequest, PromptResponse};
