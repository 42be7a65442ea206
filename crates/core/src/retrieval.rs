//! The capability contract document mode depends on: fetch passages
//! relevant to a query, scoped to one selected document (§4.6, "document
//! mode additionally performs retrieval against the vector backend,
//! filtered by selected_document").

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Returns the top passages for `query`, restricted to `document_id`.
    /// An empty result means no relevant passage was found, not an error.
    async fn retrieve(&self, query: &str, document_id: &str) -> Result<Vec<String>>;
}
