//! Vector similarity search backends for Docbot.
//!
//! Both backends implement `docbot_core::VectorStore` and embed the query
//! through an [`Embedder`] before searching. [`build_from_config`] picks the
//! backend once, at construction.

pub mod embedder;
mod http;
pub mod opensearch;
pub mod pinecone;
pub mod sigv4;

use std::sync::Arc;
use std::time::Duration;

use docbot_config::{AppConfig, VectorStoreConfig};
use docbot_core::{Error, VectorStore};

pub use embedder::{Embedder, ProviderEmbedder};
pub use opensearch::OpenSearchStore;
pub use pinecone::PineconeStore;
pub use sigv4::SigV4Signer;

/// Build the vector store the configuration selects.
///
/// Missing credentials are configuration errors: fatal now, never a
/// request-time surprise.
pub fn build_from_config(
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorStore>, Error> {
    let timeout = Duration::from_secs(config.retriever.timeout_secs);

    let store: Arc<dyn VectorStore> = match &config.vector_store {
        VectorStoreConfig::Pinecone(pc) => {
            let api_key = pc
                .api_key
                .clone()
                .ok_or_else(|| Error::config("Pinecone needs an API key (PINECONE_API_KEY)"))?;
            Arc::new(PineconeStore::new(pc, api_key, embedder, timeout)?)
        }
        VectorStoreConfig::Opensearch(os) => {
            let signer = if os.aws4_auth {
                match (&os.aws_access_key_id, &os.aws_secret_access_key) {
                    (Some(key_id), Some(secret)) => Some(SigV4Signer::new(
                        key_id.clone(),
                        secret.clone(),
                        os.aws_session_token.clone(),
                        os.aws_region.clone(),
                        os.aws_service_name.clone(),
                    )),
                    _ => {
                        return Err(Error::config(
                            "aws4_auth is on but AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY are missing",
                        ));
                    }
                }
            } else {
                None
            };
            Arc::new(OpenSearchStore::new(os, signer, embedder, timeout)?)
        }
    };

    tracing::info!(backend = store.name(), "Vector store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbot_config::{OpenSearchConfig, PineconeConfig};
    use docbot_core::ProviderError;

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![0.0; 4])
        }
    }

    fn opensearch(aws4_auth: bool) -> OpenSearchConfig {
        let toml_str = format!("url = \"localhost:9200\"\naws4_auth = {aws4_auth}");
        toml::from_str(&toml_str).unwrap()
    }

    #[test]
    fn pinecone_without_key_is_config_error() {
        let config = AppConfig::default();
        let err = build_from_config(&config, Arc::new(ZeroEmbedder)).err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn pinecone_with_key_builds() {
        let config = AppConfig {
            vector_store: VectorStoreConfig::Pinecone(PineconeConfig {
                api_key: Some("pc-key".into()),
                host: Some("docs-abc.svc.pinecone.io".into()),
                ..PineconeConfig::default()
            }),
            ..AppConfig::default()
        };
        let store = build_from_config(&config, Arc::new(ZeroEmbedder)).unwrap();
        assert_eq!(store.name(), "pinecone");
    }

    #[test]
    fn opensearch_without_signing_builds() {
        let config = AppConfig {
            vector_store: VectorStoreConfig::Opensearch(opensearch(false)),
            ..AppConfig::default()
        };
        let store = build_from_config(&config, Arc::new(ZeroEmbedder)).unwrap();
        assert_eq!(store.name(), "opensearch");
    }

    #[test]
    fn opensearch_signing_requires_credentials() {
        let config = AppConfig {
            vector_store: VectorStoreConfig::Opensearch(opensearch(true)),
            ..AppConfig::default()
        };
        let err = build_from_config(&config, Arc::new(ZeroEmbedder)).err().unwrap();
        assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
    }
}
