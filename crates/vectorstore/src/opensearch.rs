//! OpenSearch k-NN backend.
//!
//! Searches `{index}/_search` with a `knn` query on the configured vector
//! field. Requests are SigV4-signed when the cluster sits behind AWS IAM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use docbot_config::OpenSearchConfig;
use docbot_core::{Document, DocumentMetadata, Error, RetrievalError, ScoredDocument, VectorStore};
use reqwest::Url;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::http;
use crate::sigv4::SigV4Signer;

pub struct OpenSearchStore {
    client: reqwest::Client,
    search_url: Url,
    index_name: String,
    vector_field: String,
    text_field: String,
    signer: Option<SigV4Signer>,
    embedder: Arc<dyn Embedder>,
}

impl OpenSearchStore {
    pub fn new(
        config: &OpenSearchConfig,
        signer: Option<SigV4Signer>,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        if !config.verify_certs {
            warn!("OpenSearch certificate verification is disabled");
        }

        let endpoint = endpoint(&config.url, config.use_ssl);
        let search_url = Url::parse(&format!("{endpoint}/{}/_search", config.index_name))
            .map_err(|e| Error::config(format!("Invalid OpenSearch url '{}': {e}", config.url)))?;

        Ok(Self {
            client: http::client(timeout, !config.verify_certs)?,
            search_url,
            index_name: config.index_name.clone(),
            vector_field: config.vector_field.clone(),
            text_field: config.text_field.clone(),
            signer,
            embedder,
        })
    }

    /// The `host` header value the client will send.
    fn host_header(&self) -> String {
        let host = self.search_url.host_str().unwrap_or_default();
        match self.search_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn query_body(&self, vector: Vec<f32>, k: usize) -> Value {
        let mut knn = serde_json::Map::new();
        knn.insert(self.vector_field.clone(), json!({ "vector": vector, "k": k }));
        json!({
            "size": k,
            "query": { "knn": knn },
        })
    }
}

#[async_trait]
impl VectorStore for OpenSearchStore {
    fn name(&self) -> &str {
        "opensearch"
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let vector = self.embedder.embed_query(query).await?;
        let payload = serde_json::to_vec(&self.query_body(vector, k))
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        let mut request = self
            .client
            .post(self.search_url.clone())
            .header("content-type", "application/json");

        if let Some(signer) = &self.signer {
            let headers = signer.sign(
                "POST",
                &self.host_header(),
                self.search_url.path(),
                &payload,
                Utc::now(),
            );
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(http::send_error)?;
        let response = http::check_status(response, &self.index_name).await?;
        let body = http::read_json(response).await?;

        let docs = parse_hits(&body, &self.text_field)?;
        debug!(index = %self.index_name, hits = docs.len(), "OpenSearch query complete");
        Ok(docs)
    }
}

/// Prefix a scheme unless the url already carries one.
fn endpoint(url: &str, use_ssl: bool) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if use_ssl {
        format!("https://{url}")
    } else {
        format!("http://{url}")
    }
}

/// Parse `hits.hits[]`. Each `_source` holds the chunk text under
/// `text_field` and the page metadata under `metadata`.
fn parse_hits(body: &Value, text_field: &str) -> Result<Vec<ScoredDocument>, RetrievalError> {
    let hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| RetrievalError::InvalidResponse("missing hits.hits array".into()))?;

    hits.iter()
        .map(|hit| {
            let source = &hit["_source"];
            let content = source[text_field]
                .as_str()
                .ok_or_else(|| {
                    RetrievalError::InvalidResponse(format!(
                        "hit {} has no '{text_field}' field",
                        hit["_id"]
                    ))
                })?
                .to_string();

            let metadata: DocumentMetadata = match &source["metadata"] {
                Value::Object(map) => serde_json::from_value(Value::Object(map.clone()))
                    .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?,
                _ => DocumentMetadata::default(),
            };

            Ok(ScoredDocument {
                document: Document { content, metadata },
                score: hit["_score"].as_f64().unwrap_or_default() as f32,
            })
        })
        .collect()
}
