//! Retrieval-augmented answering with conversational memory.
//!
//! A turn runs through:
//!
//! 1. **Load** the session's bounded memory
//! 2. **Rewrite** the question into a standalone question (one LLM call)
//! 3. **Retrieve** the top-K documents for the standalone question
//! 4. **Assemble** them into a single context block
//! 5. **Generate** a cited answer as a stream of text chunks
//!
//! The caller saves the turn once the stream completes; a failed or
//! dropped stream leaves the session untouched.

pub mod assembler;
pub mod generator;
pub mod memory;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod rewriter;
pub mod session;
pub mod token;
pub mod trace;

pub use assembler::{ContextAssembler, render_debug_markdown};
pub use generator::AnswerGenerator;
pub use memory::ConversationMemory;
pub use pipeline::{
    AnswerStream, PipelineConfig, RagPipeline, TokenBudget, TurnState, build_vector_store,
};
pub use prompts::{PromptTemplate, QUERY_TOO_LONG, RESPONSE_ERROR, WELCOME};
pub use retriever::Retriever;
pub use rewriter::QuestionRewriter;
pub use session::ChatSession;
pub use token::{TiktokenCounter, counter_for_model};
pub use trace::{DebugRecord, DebugTrace, TraceSink, TurnTrace};
