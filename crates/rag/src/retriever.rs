//! Dense passage retrieval for document mode, scoped to one document.

use async_trait::async_trait;
use voice_agent_core::{DocumentRetriever, Error, Result};

use crate::ollama_embeddings::OllamaEmbedder;
use crate::vector_store::{SearchFilter, VectorStore};
use crate::RagError;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { top_k: 5, min_score: 0.3 }
    }
}

impl From<&voice_agent_config::RagConfig> for RetrieverConfig {
    fn from(config: &voice_agent_config::RagConfig) -> Self {
        Self { top_k: config.top_k, min_score: 0.3 }
    }
}

/// Embeds the query, searches the vector store filtered by document, and
/// returns passage text ordered by score, best first.
pub struct QdrantDocumentRetriever {
    vector_store: VectorStore,
    embedder: OllamaEmbedder,
    config: RetrieverConfig,
}

impl QdrantDocumentRetriever {
    pub fn new(vector_store: VectorStore, embedder: OllamaEmbedder, config: RetrieverConfig) -> Self {
        Self { vector_store, embedder, config }
    }
}

#[async_trait]
impl DocumentRetriever for QdrantDocumentRetriever {
    async fn retrieve(&self, query: &str, document_id: &str) -> Result<Vec<String>> {
        let embedding = self
            .embedder
            .embed_query(query)
            .await
            .map_err(rag_to_core)?;

        let results = self
            .vector_store
            .search(&embedding, self.config.top_k, Some(SearchFilter::document(document_id)))
            .await
            .map_err(rag_to_core)?;

        Ok(results
            .into_iter()
            .filter(|r| r.score >= self.config.min_score)
            .map(|r| r.content)
            .collect())
    }
}

fn rag_to_core(err: RagError) -> Error {
    Error::Retrieval(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_rag_settings_carries_top_k() {
        let settings = voice_agent_config::RagConfig {
            enabled: true,
            qdrant_endpoint: "http://localhost:6333".to_string(),
            qdrant_collection: "docs".to_string(),
            qdrant_api_key: None,
            vector_dim: 1024,
            top_k: 7,
            documents: Vec::new(),
        };
        let config = RetrieverConfig::from(&settings);
        assert_eq!(config.top_k, 7);
    }
}
