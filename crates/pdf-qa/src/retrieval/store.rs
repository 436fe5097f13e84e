//! Vector store over document chunks

use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::error::{Error, Result};

use super::index::FlatL2Index;

/// A retrieved chunk and its distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk text
    pub text: String,
    /// Squared L2 distance, lower is closer
    pub distance: f32,
}

/// Chunks and their embeddings, kept in step: `chunks[i]` is index row `i`
pub struct PdfVectorStore {
    embedder: Arc<dyn Embedder>,
    index: Option<FlatL2Index>,
    chunks: Vec<String>,
}

impl PdfVectorStore {
    /// Create an empty store. The index is created by the first batch.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: None,
            chunks: Vec::new(),
        }
    }

    /// Embed and store chunks
    pub fn add_documents(&mut self, chunks: Vec<String>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        match self.index.as_mut() {
            Some(index) => index.add(&embeddings)?,
            None => {
                let width = embeddings.first().map(Vec::len).unwrap_or(0);
                let declared = self.embedder.dimensions();
                if width != declared {
                    return Err(Error::index(format!(
                        "{} declares {}-dimensional vectors but produced {}",
                        self.embedder.name(),
                        declared,
                        width
                    )));
                }
                let mut index = FlatL2Index::new(width);
                index.add(&embeddings)?;
                self.index = Some(index);
            }
        }
        let added = texts.len();
        self.chunks.extend(chunks);

        tracing::debug!(
            "Indexed {} chunks ({} total) with {}",
            added,
            self.chunks.len(),
            self.embedder.name()
        );

        Ok(())
    }

    /// The `top_k` nearest chunks to `query`, nearest first
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_with_distances(query, top_k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like `search`, keeping the distances
    pub fn search_with_distances(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let Some(index) = self.index.as_ref() else {
            return Ok(Vec::new());
        };

        let query_embedding = self.embedder.embed(query)?;
        let neighbors = index.search(&query_embedding, top_k)?;

        neighbors
            .into_iter()
            .map(|n| {
                self.chunks
                    .get(n.position)
                    .map(|text| RetrievedChunk {
                        text: text.clone(),
                        distance: n.distance,
                    })
                    .ok_or_else(|| {
                        Error::index(format!("Index row {} has no stored chunk", n.position))
                    })
            })
            .collect()
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding width, once the first batch fixed it
    pub fn dimensions(&self) -> Option<usize> {
        self.index.as_ref().map(FlatL2Index::dimensions)
    }

    /// Stored chunks in insertion order
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }
}

impl std::fmt::Debug for PdfVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfVectorStore")
            .field("embedder", &self.embedder.name())
            .field("chunks", &self.chunks.len())
            .field("dimensions", &self.dimensions())
            .finish()
    }
}
