//! `docbot chat`: interactive conversation.

use std::io::Write;

use docbot_config::AppConfig;
use docbot_rag::{ChatSession, DebugRecord, QUERY_TOO_LONG, RESPONSE_ERROR, RagPipeline, TurnTrace};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use super::{print_stream, require_api_key};

pub async fn run(config: &AppConfig, debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    require_api_key(config)?;

    let rag = RagPipeline::from_config(config)?;
    let mut session = rag.new_session();

    println!();
    println!("  Docbot, interactive mode");
    println!();
    println!("  Model:         {}", config.llm.model);
    println!("  Vector store:  {}", config.vector_store.kind());
    println!("  Query budget:  {} tokens", rag.max_query_tokens());
    println!();
    println!("  /clear resets the conversation, /prompt shows the instructions.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();
    print_assistant(session.greeting());

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "exit" | "quit" | "/exit" | "/quit" | ":q" => break,
            "/clear" => {
                session.clear();
                println!();
                print_assistant(session.greeting());
            }
            "/prompt" => {
                for template in rag.prompts() {
                    println!();
                    println!("  --- {} ---", template.name());
                    println!("{}", template.template());
                }
            }
            question => run_turn(&rag, &mut session, question, debug).await,
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn run_turn(rag: &RagPipeline, session: &mut ChatSession, question: &str, show_debug: bool) {
    if let Err(e) = rag.check_query(question) {
        debug!(error = %e, "Question rejected");
        println!("  {QUERY_TOO_LONG}");
        return;
    }

    let mut trace = TurnTrace::default();
    println!();
    print!("  Assistant > ");
    let _ = std::io::stdout().flush();

    let result = match rag.process(session, question, Some(&mut trace)).await {
        Ok(stream) => print_stream(stream).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(answer) => {
            rag.save_turn(session, question, &answer);
            let record = trace.into_record(question, &answer);
            if show_debug {
                print_debug(&record);
            }
            session.record_debug(record);
        }
        Err(e) => {
            error!(error = %e, "Error occurred when answering");
            println!();
            println!("  {RESPONSE_ERROR}");
        }
    }
    println!();
}

fn print_assistant(text: &str) {
    for line in text.lines() {
        println!("  Assistant > {line}");
    }
    println!();
}

fn print_debug(record: &DebugRecord) {
    println!();
    println!("  [debug] {}", record.label());
    for line in record.rendered_context.lines() {
        println!("  [debug] {line}");
    }
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
