//! Pinecone backend.
//!
//! The query is embedded, then sent to the index's data-plane host. When
//! no host is configured it is looked up once through the control plane
//! (`GET /indexes/{name}`) and cached for the lifetime of the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_config::PineconeConfig;
use docbot_core::{Document, DocumentMetadata, Error, RetrievalError, ScoredDocument, VectorStore};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::http;

/// Metadata key the chunk text is indexed under.
const TEXT_KEY: &str = "text";

pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    index_name: String,
    control_plane_url: String,
    namespace: Option<String>,
    host: OnceCell<String>,
    embedder: Arc<dyn Embedder>,
}

impl PineconeStore {
    pub fn new(
        config: &PineconeConfig,
        api_key: String,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let host = match &config.host {
            Some(h) => OnceCell::new_with(Some(normalize_host(h))),
            None => OnceCell::new(),
        };

        Ok(Self {
            client: http::client(timeout, false)?,
            api_key,
            index_name: config.index_name.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            host,
            embedder,
        })
    }

    async fn host(&self) -> Result<&str, RetrievalError> {
        self.host
            .get_or_try_init(|| self.describe_index())
            .await
            .map(String::as_str)
    }

    async fn describe_index(&self) -> Result<String, RetrievalError> {
        let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);
        debug!(index = %self.index_name, "Resolving Pinecone index host");

        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status(response, &self.index_name).await?;
        let body = http::read_json(response).await?;

        let host = body["host"]
            .as_str()
            .ok_or_else(|| RetrievalError::InvalidResponse("index description has no host".into()))?;

        info!(index = %self.index_name, host, "Pinecone index resolved");
        Ok(normalize_host(host))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let vector = self.embedder.embed_query(query).await?;
        let host = self.host().await?;

        let mut body = json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }

        let response = self
            .client
            .post(format!("{host}/query"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status(response, &self.index_name).await?;
        let body = http::read_json(response).await?;

        let docs = parse_matches(&body)?;
        debug!(index = %self.index_name, hits = docs.len(), "Pinecone query complete");
        Ok(docs)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Parse a `/query` response. Matches come back best first.
fn parse_matches(body: &Value) -> Result<Vec<ScoredDocument>, RetrievalError> {
    let matches = body["matches"]
        .as_array()
        .ok_or_else(|| RetrievalError::InvalidResponse("missing matches array".into()))?;

    matches
        .iter()
        .map(|m| {
            let score = m["score"].as_f64().unwrap_or_default() as f32;
            let mut metadata = match &m["metadata"] {
                Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };
            let content = match metadata.remove(TEXT_KEY) {
                Some(Value::String(text)) => text,
                _ => {
                    return Err(RetrievalError::InvalidResponse(format!(
                        "match {} has no '{TEXT_KEY}' metadata",
                        m["id"]
                    )));
                }
            };
            let metadata: DocumentMetadata = serde_json::from_value(Value::Object(metadata))
                .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

            Ok(ScoredDocument {
                document: Document { content, metadata },
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_matches_in_order() {
        let body = json!({
            "matches": [
                {
                    "id": "a",
                    "score": 0.91,
                    "metadata": {
                        "text": "An Actor is a serverless program.",
                        "title": "Actors",
                        "url": "https://docs.apify.com/actors",
                        "chunk": 3
                    }
                },
                {
                    "id": "b",
                    "score": 0.72,
                    "metadata": { "text": "Run it from Console." }
                }
            ],
            "namespace": ""
        });

        let docs = parse_matches(&body).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document.content, "An Actor is a serverless program.");
        assert_eq!(docs[0].document.title(), "Actors");
        assert_eq!(docs[0].document.url(), "https://docs.apify.com/actors");
        assert_eq!(docs[0].document.metadata.extra["chunk"], json!(3));
        assert!(!docs[0].document.metadata.extra.contains_key("text"));
        assert!((docs[0].score - 0.91).abs() < 1e-6);
        assert_eq!(docs[1].document.title(), "");
    }

    #[test]
    fn empty_matches_is_empty_result() {
        let docs = parse_matches(&json!({ "matches": [] })).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn match_without_text_is_invalid() {
        let body = json!({ "matches": [{ "id": "x", "score": 0.5, "metadata": { "title": "t" } }] });
        assert!(matches!(
            parse_matches(&body),
            Err(RetrievalError::InvalidResponse(_))
        ));
    }

    #[test]
    fn missing_matches_is_invalid() {
        assert!(parse_matches(&json!({ "results": [] })).is_err());
    }

    #[test]
    fn host_gets_scheme() {
        assert_eq!(normalize_host("docs-abc.svc.pinecone.io"), "https://docs-abc.svc.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }
}
