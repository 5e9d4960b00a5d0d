//! `docbot ask`: answer one question and exit.

use docbot_config::AppConfig;
use docbot_rag::{QUERY_TOO_LONG, RESPONSE_ERROR, RagPipeline};
use tracing::error;

use super::{print_stream, require_api_key};

pub async fn run(config: &AppConfig, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_api_key(config)?;

    let rag = RagPipeline::from_config(config)?;
    if rag.check_query(question).is_err() {
        println!("{QUERY_TOO_LONG}");
        return Err("question exceeds the query budget".into());
    }

    let session = rag.new_session();
    let result = match rag.process(&session, question, None).await {
        Ok(stream) => print_stream(stream).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "Error occurred when answering");
        println!("{RESPONSE_ERROR}");
        return Err(e.into());
    }
    Ok(())
}
