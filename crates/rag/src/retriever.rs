//! Top-K retrieval over a vector store.

use std::sync::Arc;

use docbot_core::{Error, RetrievalError, RetrievalResult, VectorStore};
use tracing::debug;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    /// `top_k` must be positive.
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize) -> Result<Self, Error> {
        if top_k == 0 {
            return Err(Error::config("retriever top_k must be greater than 0"));
        }
        Ok(Self { store, top_k })
    }

    /// The `top_k` most similar documents, most similar first.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult, RetrievalError> {
        let scored = self.store.similarity_search(query, self.top_k).await?;
        debug!(
            backend = self.store.name(),
            requested = self.top_k,
            returned = scored.len(),
            "Documents retrieved"
        );
        Ok(scored.into_iter().map(|s| s.document).collect())
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn backend(&self) -> &str {
        self.store.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbot_core::{Document, ScoredDocument};
    use std::sync::Mutex;

    struct RecordingStore {
        docs: Vec<ScoredDocument>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn similarity_search(
            &self,
            query: &str,
            k: usize,
        ) -> Result<Vec<ScoredDocument>, RetrievalError> {
            self.calls.lock().unwrap().push((query.to_string(), k));
            Ok(self.docs.iter().take(k).cloned().collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn similarity_search(&self, _: &str, _: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
            Err(RetrievalError::IndexNotFound("apify-doc-platform".into()))
        }
    }

    fn scored(content: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: Document::new(content),
            score,
        }
    }

    #[test]
    fn zero_top_k_is_config_error() {
        let store = Arc::new(FailingStore);
        assert!(matches!(
            Retriever::new(store, 0),
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn forwards_query_and_k_and_keeps_order() {
        let store = Arc::new(RecordingStore {
            docs: vec![scored("first", 0.9), scored("second", 0.8), scored("third", 0.7)],
            calls: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(store.clone(), 2).unwrap();

        let docs = retriever.retrieve("What is an Actor?").await.unwrap();
        let contents: Vec<_> = docs.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(
            store.calls.lock().unwrap().as_slice(),
            &[("What is an Actor?".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn errors_surface_unchanged() {
        let retriever = Retriever::new(Arc::new(FailingStore), 5).unwrap();
        let err = retriever.retrieve("q").await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotFound(_)));
    }
}
