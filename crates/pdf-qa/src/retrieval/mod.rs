//! Retrieval: flat L2 index and the chunk vector store

mod index;
mod store;

pub use index::{FlatL2Index, Neighbor};
pub use store::{PdfVectorStore, RetrievedChunk};
