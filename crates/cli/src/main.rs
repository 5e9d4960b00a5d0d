//! Docbot CLI: the main entry point.
//!
//! Commands:
//! - `chat`    Interactive conversation with the documentation
//! - `ask`     Answer a single question
//! - `search`  Raw similarity search, optionally with a generated answer
//! - `init`    Write the default config file
//! - `config`  Show the effective configuration and query budget

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docbot_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "docbot",
    about = "Docbot: ask questions about the Apify platform documentation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.docbot/config.toml
    #[arg(long, global = true, env = "DOCBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the documentation assistant
    Chat {
        /// Print the standalone question and retrieved documents after each answer
        #[arg(long)]
        debug: bool,
    },

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Search the documentation index
    Search {
        /// The search query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Number of documents to return
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Also generate an answer from the results
        #[arg(long)]
        answer: bool,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        init_tracing(cli.verbose, "info");
        return commands::init::run(cli.config.as_deref(), force).await;
    }

    let config = AppConfig::load_with(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;
    init_tracing(cli.verbose, &config.log_level);

    match cli.command {
        Commands::Chat { debug } => commands::chat::run(&config, debug).await?,
        Commands::Ask { question } => commands::ask::run(&config, &question.join(" ")).await?,
        Commands::Search { query, k, answer } => {
            commands::search::run(&config, &query.join(" "), k, answer).await?
        }
        Commands::Config => commands::config_cmd::show(&config, cli.config.as_deref()).await?,
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Logs go to stderr; stdout carries answers.
fn init_tracing(verbose: bool, level: &str) {
    let filter = if verbose { "debug" } else { level };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
