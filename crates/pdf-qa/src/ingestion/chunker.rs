//! Fixed-size sliding window chunking
//!
//! Every page is cut into windows of `chunk_size` characters that start
//! `chunk_size - overlap` characters apart. Windows are trimmed of surrounding
//! whitespace before they are handed out as chunks. Sizes and offsets count
//! characters, not bytes.

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

use super::{PageSource, PdfPageSource};

/// Character range of one window within a page, before trimming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    /// First character of the window
    pub start: usize,
    /// One past the last character of the window
    pub end: usize,
}

impl ChunkWindow {
    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the window covers nothing
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Sliding window chunker with configurable size and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WindowChunker {
    /// Create a chunker. The window has to advance, so `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Create from the chunking section of the configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.overlap)
    }

    /// Window width in characters
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive windows
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Windows over a page of `len` characters
    pub fn windows(&self, len: usize) -> Windows {
        Windows {
            next_start: Some(0),
            len,
            chunk_size: self.chunk_size,
            step: self.step(),
        }
    }

    /// Lazily chunk one page of text
    pub fn chunk_page<'a>(&self, text: &'a str) -> PageChunks<'a> {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        let char_count = boundaries.len() - 1;

        PageChunks {
            text,
            boundaries,
            windows: self.windows(char_count),
        }
    }
}

/// Iterator over the windows of one page
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: Option<usize>,
    len: usize,
    chunk_size: usize,
    step: usize,
}

impl Iterator for Windows {
    type Item = ChunkWindow;

    fn next(&mut self) -> Option<ChunkWindow> {
        let start = self.next_start?;
        if start >= self.len {
            self.next_start = None;
            return None;
        }

        let end = (start + self.chunk_size).min(self.len);
        // Once a window reaches the end of the page any later window would lie
        // entirely inside its overlap
        self.next_start = if end >= self.len {
            None
        } else {
            Some(start + self.step)
        };

        Some(ChunkWindow { start, end })
    }
}

/// Iterator over the trimmed chunks of one page
#[derive(Debug, Clone)]
pub struct PageChunks<'a> {
    text: &'a str,
    /// Byte offset of every character, plus the text length
    boundaries: Vec<usize>,
    windows: Windows,
}

impl<'a> PageChunks<'a> {
    fn slice(&self, window: ChunkWindow) -> &'a str {
        let text: &'a str = self.text;
        &text[self.boundaries[window.start]..self.boundaries[window.end]]
    }
}

impl Iterator for PageChunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let window = self.windows.next()?;
        Some(self.slice(window).trim().to_string())
    }
}

/// The chunks of one document: extracted pages plus the chunker to cut them.
///
/// Chunking is lazy and `iter` can be called any number of times.
#[derive(Debug, Clone)]
pub struct DocumentChunks {
    pages: Vec<String>,
    chunker: WindowChunker,
}

impl DocumentChunks {
    /// Wrap already extracted pages
    pub fn new(pages: Vec<String>, chunker: WindowChunker) -> Self {
        Self { pages, chunker }
    }

    /// Extract the pages of `path` through `source`
    pub fn load(source: &dyn PageSource, path: &Path, chunker: WindowChunker) -> Result<Self> {
        let pages = source.pages(path)?;
        Ok(Self::new(pages, chunker))
    }

    /// Number of extracted pages, including empty ones
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Chunks of every page in order, concatenated
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.pages
            .iter()
            .flat_map(move |page| self.chunker.chunk_page(page))
    }

    /// Collect all chunks
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().collect()
    }
}

/// Extract a PDF and prepare its chunks
pub fn pdf_to_text_chunks(path: &Path, chunk_size: usize, overlap: usize) -> Result<DocumentChunks> {
    let chunker = WindowChunker::new(chunk_size, overlap)?;
    DocumentChunks::load(&PdfPageSource, path, chunker)
}
