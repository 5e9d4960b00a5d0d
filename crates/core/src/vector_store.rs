//! VectorStore trait: the abstraction over similarity-search backends.
//!
//! Implementations: Pinecone (managed vector database) and OpenSearch k-NN
//! (optionally SigV4-signed). The retriever only ever sees this trait, so
//! the backend is chosen once at construction and never branched on again.

use async_trait::async_trait;

use crate::document::ScoredDocument;
use crate::error::RetrievalError;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "pinecone", "opensearch").
    fn name(&self) -> &str;

    /// Return the `k` documents most similar to `query`, most similar first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, RetrievalError>;
}
