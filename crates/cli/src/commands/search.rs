//! `docbot search`: inspect what the index returns for a query.

use std::sync::Arc;

use docbot_config::AppConfig;
use docbot_core::Provider;
use docbot_rag::{RESPONSE_ERROR, RagPipeline, TurnTrace, build_vector_store};
use tracing::error;

use super::{print_documents, print_stream, require_api_key};

pub async fn run(
    config: &AppConfig,
    query: &str,
    k: usize,
    answer: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    require_api_key(config)?;
    if k == 0 {
        return Err("-k must be at least 1".into());
    }

    if answer {
        return search_and_answer(config, query, k).await;
    }

    let provider: Arc<dyn Provider> = Arc::new(docbot_providers::build_from_config(config)?);
    let store = build_vector_store(config, provider)?;

    let results = store.similarity_search(query, k).await?;
    println!();
    println!("  {} result(s) from {} for \"{query}\"", results.len(), store.name());
    println!();
    print_documents(results.iter().map(|r| (&r.document, Some(r.score))));
    Ok(())
}

/// Run a full turn with `top_k = k`, then list the documents it used.
async fn search_and_answer(
    config: &AppConfig,
    query: &str,
    k: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    config.retriever.top_k = k;

    let rag = RagPipeline::from_config(&config)?;
    rag.check_query(query)?;
    let session = rag.new_session();

    let mut trace = TurnTrace::default();
    let result = match rag.process(&session, query, Some(&mut trace)).await {
        Ok(stream) => print_stream(stream).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "Error occurred when answering");
        println!("{RESPONSE_ERROR}");
        return Err(e.into());
    }

    println!();
    println!("  Sources:");
    println!();
    print_documents(trace.documents.iter().map(|doc| (doc, None)));
    Ok(())
}
