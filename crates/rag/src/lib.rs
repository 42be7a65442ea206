//! Document-mode retrieval: embeds a query via Ollama, searches a Qdrant
//! collection scoped to one document, and returns passage text for the
//! reply pipeline to fold into the prompt.

pub mod ollama_embeddings;
pub mod retriever;
pub mod vector_store;

pub use ollama_embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
pub use retriever::{QdrantDocumentRetriever, RetrieverConfig};
pub use vector_store::{SearchFilter, VectorDistance, VectorSearchResult, VectorStore, VectorStoreConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<RagError> for voice_agent_core::Error {
    fn from(err: RagError) -> Self {
        voice_agent_core::Error::Retrieval(err.to_string())
    }
}
