//! `docbot config`: show the effective configuration.

use std::path::Path;

use docbot_config::AppConfig;
use docbot_rag::{PipelineConfig, TokenBudget, counter_for_model};

pub async fn show(config: &AppConfig, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => AppConfig::config_path(),
    };

    println!("# Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("# (not found, built-in defaults in effect)");
    }
    println!();
    println!("{}", toml::to_string_pretty(&config.redacted())?);

    let counter = counter_for_model(&config.llm.model);
    let budget = TokenBudget::new(&PipelineConfig::from(config), counter.as_ref());

    println!("# Token budget");
    println!("#   context window:    {}", budget.model_context_window);
    println!("#   retrieved context: {}", budget.reserved_context_tokens);
    println!("#   chat history:      {}", budget.reserved_history_tokens);
    println!("#   prompt templates:  {}", budget.prompt_template_tokens);
    println!("#   metadata buffer:   {}", budget.metadata_buffer_tokens);
    match budget.max_query_tokens() {
        Some(max) => println!("#   max question:      {max}"),
        None => println!("#   max question:      none, the context window is too small"),
    }
    Ok(())
}
