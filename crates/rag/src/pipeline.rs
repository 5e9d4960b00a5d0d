//! The turn pipeline.
//!
//! One turn walks a fixed sequence of states:
//!
//! ```text
//! Idle → MemoryLoaded → QuestionRewritten → Retrieved → ContextAssembled
//!      → AnswerStreaming → TurnComplete
//! ```
//!
//! Any stage failure moves the turn to `TurnFailed`. The pipeline never
//! writes to memory; callers persist a turn with [`RagPipeline::save_turn`]
//! once the answer stream has completed.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use docbot_config::AppConfig;
use docbot_core::provider::ChunkReceiver;
use docbot_core::{
    ConversationTurn, Error, Provider, ProviderError, RetrievalError, TokenCounter, VectorStore,
};
use docbot_vectorstore::ProviderEmbedder;
use futures::Stream;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::ContextAssembler;
use crate::generator::AnswerGenerator;
use crate::memory::ConversationMemory;
use crate::prompts::PromptTemplate;
use crate::retriever::Retriever;
use crate::rewriter::QuestionRewriter;
use crate::session::ChatSession;
use crate::token::counter_for_model;
use crate::trace::TraceSink;

/// Where a turn is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    MemoryLoaded,
    QuestionRewritten,
    Retrieved,
    ContextAssembled,
    AnswerStreaming,
    TurnComplete,
    TurnFailed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MemoryLoaded => "memory_loaded",
            Self::QuestionRewritten => "question_rewritten",
            Self::Retrieved => "retrieved",
            Self::ContextAssembled => "context_assembled",
            Self::AnswerStreaming => "answer_streaming",
            Self::TurnComplete => "turn_complete",
            Self::TurnFailed => "turn_failed",
        }
    }

    /// The state a successful stage leads to.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::MemoryLoaded),
            Self::MemoryLoaded => Some(Self::QuestionRewritten),
            Self::QuestionRewritten => Some(Self::Retrieved),
            Self::Retrieved => Some(Self::ContextAssembled),
            Self::ContextAssembled => Some(Self::AnswerStreaming),
            Self::AnswerStreaming => Some(Self::TurnComplete),
            Self::TurnComplete | Self::TurnFailed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TurnComplete | Self::TurnFailed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model, retrieval and budget settings for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: String,
    pub temperature: f32,
    pub context_window_tokens: usize,
    pub top_k: usize,
    pub chunk_size: usize,
    pub history_max_tokens: usize,
    /// Limit for each LLM call, and for the gap between answer chunks
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            context_window_tokens: 16385,
            top_k: 5,
            chunk_size: 500,
            history_max_tokens: 1200,
            llm_timeout: Duration::from_secs(10),
            retrieval_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            context_window_tokens: config.llm.context_window_tokens,
            top_k: config.retriever.top_k,
            chunk_size: config.retriever.chunk_size,
            history_max_tokens: config.history.max_tokens,
            llm_timeout: Duration::from_secs(config.llm.request_timeout_secs),
            retrieval_timeout: Duration::from_secs(config.retriever.timeout_secs),
        }
    }
}

/// How the model's context window is shared out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub model_context_window: usize,
    /// `top_k × chunk_size`
    pub reserved_context_tokens: usize,
    pub reserved_history_tokens: usize,
    /// Both instruction templates, unrendered
    pub prompt_template_tokens: usize,
    /// One chunk's worth of slack for titles and urls
    pub metadata_buffer_tokens: usize,
}

impl TokenBudget {
    /// The budget `config` implies, with both instruction templates counted
    /// by `counter`.
    pub fn new(config: &PipelineConfig, counter: &dyn TokenCounter) -> Self {
        Self {
            model_context_window: config.context_window_tokens,
            reserved_context_tokens: config.top_k * config.chunk_size,
            reserved_history_tokens: config.history_max_tokens,
            prompt_template_tokens: counter.count(PromptTemplate::rag().template())
                + counter.count(PromptTemplate::standalone_question().template()),
            metadata_buffer_tokens: config.chunk_size,
        }
    }

    /// Tokens left for the raw question, `None` when the reservations use
    /// up the whole window.
    pub fn max_query_tokens(&self) -> Option<usize> {
        let reserved = self.reserved_context_tokens
            + self.reserved_history_tokens
            + self.prompt_template_tokens
            + self.metadata_buffer_tokens;
        self.model_context_window
            .checked_sub(reserved)
            .filter(|left| *left > 0)
    }
}

/// Retrieval-augmented answering over a documentation index.
pub struct RagPipeline {
    rewriter: QuestionRewriter,
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    counter: Arc<dyn TokenCounter>,
    budget: TokenBudget,
    max_query_tokens: usize,
    history_max_tokens: usize,
    llm_timeout: Duration,
    retrieval_timeout: Duration,
}

impl RagPipeline {
    /// Build a pipeline. Fails when `top_k` is zero or the context window
    /// leaves no room for a question.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        counter: Arc<dyn TokenCounter>,
        config: PipelineConfig,
    ) -> Result<Self, Error> {
        let rewriter = QuestionRewriter::new(provider.clone(), &config.model, config.temperature);
        let generator = AnswerGenerator::new(provider, &config.model, config.temperature);
        let retriever = Retriever::new(store, config.top_k)?;

        let budget = TokenBudget::new(&config, counter.as_ref());
        let max_query_tokens = budget.max_query_tokens().ok_or_else(|| {
            Error::config(format!(
                "context window of {} tokens leaves no room for a question \
                 (context {}, history {}, prompts {}, metadata {})",
                budget.model_context_window,
                budget.reserved_context_tokens,
                budget.reserved_history_tokens,
                budget.prompt_template_tokens,
                budget.metadata_buffer_tokens
            ))
        })?;

        info!(
            model = %config.model,
            backend = retriever.backend(),
            top_k = config.top_k,
            max_query_tokens,
            "RAG pipeline ready"
        );

        Ok(Self {
            rewriter,
            retriever,
            assembler: ContextAssembler::new(),
            generator,
            counter,
            budget,
            max_query_tokens,
            history_max_tokens: config.history_max_tokens,
            llm_timeout: config.llm_timeout,
            retrieval_timeout: config.retrieval_timeout,
        })
    }

    /// Wire provider, vector store and tokenizer from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider: Arc<dyn Provider> = Arc::new(docbot_providers::build_from_config(config)?);
        let store = build_vector_store(config, provider.clone())?;
        let counter = counter_for_model(&config.llm.model);
        Self::new(provider, store, counter, PipelineConfig::from(config))
    }

    /// A new session seeded with the greeting, bounded to this pipeline's
    /// history ceiling.
    pub fn new_session(&self) -> ChatSession {
        let session = ChatSession::new(ConversationMemory::new(
            self.history_max_tokens,
            self.counter.clone(),
        ));
        info!(session = %session.id(), "Session started");
        session
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Maximum tokens allowed for a raw user question.
    pub fn max_query_tokens(&self) -> usize {
        self.max_query_tokens
    }

    /// Reject a question that does not fit the query budget.
    pub fn check_query(&self, question: &str) -> Result<(), Error> {
        let tokens = self.counter.count(question);
        if tokens > self.max_query_tokens {
            return Err(Error::BudgetExceeded {
                tokens,
                max: self.max_query_tokens,
            });
        }
        Ok(())
    }

    /// The instruction templates: answer prompt first, then the
    /// standalone-question prompt.
    pub fn prompts(&self) -> [&PromptTemplate; 2] {
        [self.generator.prompt(), self.rewriter.prompt()]
    }

    /// Run a turn up to the start of the answer stream.
    ///
    /// `trace` receives the standalone question and the retrieved documents
    /// before this returns. The session is only read; nothing is saved.
    pub async fn process(
        &self,
        session: &ChatSession,
        question: &str,
        mut trace: Option<&mut dyn TraceSink>,
    ) -> Result<AnswerStream, Error> {
        let mut turn = Turn::new(session.id());
        info!(session = %session.id(), "Turn started");

        let history = session.memory().load();
        let history_text = session.memory().render();
        turn.advance(TurnState::MemoryLoaded);

        let standalone = within(self.llm_timeout, self.rewriter.rewrite(question, history), || {
            ProviderError::Timeout(format!(
                "standalone question rewrite exceeded {:?}",
                self.llm_timeout
            ))
            .into()
        })
        .await
        .map_err(|e| turn.fail(e))?;
        turn.advance(TurnState::QuestionRewritten);
        if let Some(sink) = trace.as_deref_mut() {
            sink.standalone_question(&standalone);
        }

        let docs = within(self.retrieval_timeout, self.retriever.retrieve(&standalone), || {
            RetrievalError::Timeout(format!(
                "similarity search exceeded {:?}",
                self.retrieval_timeout
            ))
            .into()
        })
        .await
        .map_err(|e| turn.fail(e))?;
        turn.advance(TurnState::Retrieved);
        if let Some(sink) = trace.as_deref_mut() {
            sink.retrieved_documents(&docs);
        }

        let context = self.assembler.assemble(&docs);
        turn.advance(TurnState::ContextAssembled);

        let chunks = within(
            self.llm_timeout,
            self.generator.generate(&standalone, &context, &history_text),
            || {
                ProviderError::Timeout(format!(
                    "answer generation did not start within {:?}",
                    self.llm_timeout
                ))
                .into()
            },
        )
        .await
        .map_err(|e| turn.fail(e))?;
        turn.advance(TurnState::AnswerStreaming);

        info!(session = %session.id(), documents = docs.len(), "Answer streaming");
        Ok(AnswerStream::new(session.id(), chunks, self.llm_timeout))
    }

    /// Persist a completed turn to the session's memory.
    pub fn save_turn(&self, session: &mut ChatSession, question: &str, answer: &str) {
        session.save(ConversationTurn::new(question, answer));
        debug!(
            session = %session.id(),
            turns = session.memory().len(),
            tokens = session.memory().token_count(),
            "Turn saved"
        );
    }
}

/// Build the configured vector store, embedding queries through `provider`.
pub fn build_vector_store(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<Arc<dyn VectorStore>, Error> {
    let embedder = Arc::new(ProviderEmbedder::new(provider, config.embedding.model.clone()));
    docbot_vectorstore::build_from_config(config, embedder)
}

/// Run a stage under a deadline.
async fn within<T, E: Into<Error>>(
    limit: Duration,
    stage: impl Future<Output = Result<T, E>>,
    timed_out: impl FnOnce() -> Error,
) -> Result<T, Error> {
    match tokio::time::timeout(limit, stage).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(timed_out()),
    }
}

/// State bookkeeping for one turn up to the start of streaming.
struct Turn {
    session: Uuid,
    state: TurnState,
}

impl Turn {
    fn new(session: Uuid) -> Self {
        Self {
            session,
            state: TurnState::Idle,
        }
    }

    fn advance(&mut self, to: TurnState) {
        debug_assert_eq!(self.state.next(), Some(to), "turn stages run in order");
        debug!(session = %self.session, from = %self.state, to = %to, "Turn state");
        self.state = to;
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(session = %self.session, state = %self.state, error = %err, "Turn failed");
        self.state = TurnState::TurnFailed;
        err
    }
}

/// The streamed answer of one turn.
///
/// Yields text chunks in order. Ends after the provider's final chunk
/// (`TurnComplete`), or with one error (`TurnFailed`). Dropping it
/// early cancels the turn.
pub struct AnswerStream {
    session: Uuid,
    chunks: ChunkReceiver,
    state: TurnState,
    answer: String,
    finished: bool,
    idle_limit: Duration,
    idle: Pin<Box<Sleep>>,
}

impl AnswerStream {
    fn new(session: Uuid, chunks: ChunkReceiver, idle_limit: Duration) -> Self {
        Self {
            session,
            chunks,
            state: TurnState::AnswerStreaming,
            answer: String::new(),
            finished: false,
            idle_limit,
            idle: Box::pin(tokio::time::sleep(idle_limit)),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The answer text received so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Drain the stream and return the full answer.
    pub async fn collect_answer(mut self) -> Result<String, Error> {
        use futures::StreamExt;

        while let Some(chunk) = self.next().await {
            chunk?;
        }
        Ok(std::mem::take(&mut self.answer))
    }

    fn complete(&mut self) {
        self.state = TurnState::TurnComplete;
        info!(session = %self.session, chars = self.answer.len(), "Turn complete");
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(session = %self.session, error = %err, "Answer stream failed");
        self.state = TurnState::TurnFailed;
        err
    }
}

impl Stream for AnswerStream {
    type Item = Result<String, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }
        if this.finished {
            this.complete();
            return Poll::Ready(None);
        }

        loop {
            match this.chunks.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let deadline = Instant::now() + this.idle_limit;
                    this.idle.as_mut().reset(deadline);
                    this.finished = chunk.done;

                    match chunk.content {
                        Some(text) if !text.is_empty() => {
                            this.answer.push_str(&text);
                            return Poll::Ready(Some(Ok(text)));
                        }
                        _ if this.finished => {
                            this.complete();
                            return Poll::Ready(None);
                        }
                        _ => continue,
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(this.fail(e.into()))));
                }
                Poll::Ready(None) => {
                    let err = ProviderError::StreamInterrupted(
                        "answer stream closed before completion".into(),
                    );
                    return Poll::Ready(Some(Err(this.fail(err.into()))));
                }
                Poll::Pending => {
                    if this.idle.as_mut().poll(cx).is_ready() {
                        let err = ProviderError::Timeout(format!(
                            "no answer chunk within {:?}",
                            this.idle_limit
                        ));
                        return Poll::Ready(Some(Err(this.fail(err.into()))));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            debug!(session = %self.session, "Answer stream dropped before completion");
        }
    }
}
