//! Document ingestion: PDF page extraction and window chunking

mod chunker;
mod fingerprint;
pub mod pdf;

use std::path::Path;

use crate::error::Result;

pub use chunker::{
    pdf_to_text_chunks, ChunkWindow, DocumentChunks, PageChunks, WindowChunker, Windows,
};
pub use fingerprint::corpus_fingerprint;

/// Source of per-page document text
///
/// Implementations:
/// - `PdfPageSource`: pdf-extract with a lopdf fallback
pub trait PageSource: Send + Sync {
    /// Extract the text of every page of the document at `path`
    fn pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Reads pages straight from PDF files on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    fn pages(&self, path: &Path) -> Result<Vec<String>> {
        pdf::extract_pages(path)
    }
}
