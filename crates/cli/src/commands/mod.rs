pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod init;
pub mod search;

use std::io::Write;

use docbot_config::AppConfig;
use docbot_core::{Document, Error};
use docbot_rag::AnswerStream;
use futures::StreamExt;

/// Fail early, with setup instructions, when no API key is configured.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENAI_API_KEY='sk-...'");
    eprintln!("    export DOCBOT_API_KEY='sk-...'");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Print answer chunks as they arrive and return the full answer.
pub async fn print_stream(mut stream: AnswerStream) -> Result<String, Error> {
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let text = chunk?;
        print!("{text}");
        let _ = stdout.flush();
    }
    println!();
    Ok(stream.answer().to_string())
}

/// Numbered listing of documents, with scores when known.
pub fn print_documents<'a>(docs: impl IntoIterator<Item = (&'a Document, Option<f32>)>) {
    for (i, (doc, score)) in docs.into_iter().enumerate() {
        println!("{}. {}", i + 1, doc.title());
        println!("   url:   {}", doc.url());
        match score {
            Some(score) => println!("   score: {score:.4}"),
            None => println!("   score: n/a"),
        }
        for line in doc.content.lines() {
            println!("   | {line}");
        }
        println!();
    }
}
