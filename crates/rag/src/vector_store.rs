//! Vector store client backed by Qdrant.
//!
//! Dense similarity search, scoped by document so that document mode never
//! retrieves passages from a document the caller didn't select.

use qdrant_client::{
    qdrant::{
        value::Kind, Condition, Distance, FieldCondition, Filter, Match, SearchPointsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;
use voice_agent_config::constants::endpoints;

use crate::RagError;

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_dim: usize,
    pub distance: VectorDistance,
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.to_string(),
            collection: "voice_agent_documents".to_string(),
            vector_dim: 1024,
            distance: VectorDistance::Cosine,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDistance {
    Cosine,
    Euclidean,
    DotProduct,
}

impl From<VectorDistance> for Distance {
    fn from(d: VectorDistance) -> Self {
        match d {
            VectorDistance::Cosine => Distance::Cosine,
            VectorDistance::Euclidean => Distance::Euclid,
            VectorDistance::DotProduct => Distance::Dot,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// Scopes a search to one document, matching the connection's
/// `selected_document`.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub document_id: String,
}

impl SearchFilter {
    pub fn document(document_id: impl Into<String>) -> Self {
        Self { document_id: document_id.into() }
    }

    fn into_qdrant(self) -> Filter {
        Filter {
            must: vec![Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    FieldCondition {
                        key: "document_id".to_string(),
                        r#match: Some(Match {
                            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                                self.document_id,
                            )),
                        }),
                        ..Default::default()
                    },
                )),
            }],
            ..Default::default()
        }
    }
}

pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<VectorSearchResult>, RagError> {
        let mut search_builder = SearchPointsBuilder::new(
            &self.config.collection,
            query_embedding.to_vec(),
            top_k as u64,
        )
        .with_payload(true);

        if let Some(f) = filter {
            search_builder = search_builder.filter(f.into_qdrant());
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = HashMap::new();
                let mut content = String::new();

                for (k, v) in point.payload {
                    if k == "text" {
                        if let Some(Kind::StringValue(s)) = v.kind {
                            content = s;
                        }
                    } else if let Some(Kind::StringValue(s)) = v.kind {
                        metadata.insert(k, s);
                    }
                }

                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
                        None => String::new(),
                    })
                    .unwrap_or_default();

                VectorSearchResult { id, score: point.score, content, metadata }
            })
            .collect())
    }

    pub async fn collection_exists(&self) -> Result<bool, RagError> {
        self.client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_uses_a_generic_collection_name() {
        let config = VectorStoreConfig::default();
        assert_eq!(config.collection, "voice_agent_documents");
        assert_eq!(config.distance, VectorDistance::Cosine);
    }

    #[test]
    fn search_filter_scopes_to_one_document() {
        let filter = SearchFilter::document("doc-42");
        assert_eq!(filter.document_id, "doc-42");
    }
}
