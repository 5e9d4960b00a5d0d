//! Turn-level scenarios for the RAG pipeline.
//!
//! Every collaborator is scripted: the provider replays canned rewrites and
//! answer streams, the vector store returns fixed documents, and tokens are
//! counted one per whitespace-separated word so budgets are exact.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::provider::ChunkReceiver;
use docbot_core::{
    Document, Error, Message, Provider, ProviderError, ProviderRequest, ProviderResponse,
    RetrievalError, ScoredDocument, StreamChunk, TokenCounter, VectorStore,
};
use docbot_rag::{
    PipelineConfig, RagPipeline, TraceSink, TurnState, TurnTrace, WELCOME,
};
use futures::StreamExt;
use tokio::sync::mpsc;

// ── Scripted collaborators ───────────────────────────────────────────────

struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

/// How one answer stream plays out.
enum Answer {
    /// Deltas followed by the final chunk.
    Chunks(Vec<&'static str>),
    /// Deltas followed by a mid-stream error.
    FailAfter(Vec<&'static str>, ProviderError),
    /// Nothing is sent; the sender is kept open.
    Hold,
}

struct ScriptedProvider {
    rewrites: Mutex<VecDeque<Result<String, ProviderError>>>,
    answers: Mutex<VecDeque<Answer>>,
    requests: Mutex<Vec<ProviderRequest>>,
    held: Mutex<Vec<ChunkSender>>,
    rewrite_delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(rewrites: Vec<&str>, answers: Vec<Answer>) -> Self {
        Self {
            rewrites: Mutex::new(rewrites.into_iter().map(|r| Ok(r.to_string())).collect()),
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
            rewrite_delay: None,
        }
    }

    fn with_rewrite_delay(mut self, delay: Duration) -> Self {
        self.rewrite_delay = Some(delay);
        self
    }

    /// Prompts of every request so far, in call order.
    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages[0].content.clone())
            .collect()
    }

    fn held_senders(&self) -> Vec<ChunkSender> {
        self.held.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.rewrite_delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .rewrites
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no rewrite left")?;
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: None,
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        assert!(request.stream, "answers must be streamed");
        self.requests.lock().unwrap().push(request);

        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no answer left");

        let (tx, rx) = mpsc::channel(16);
        let delta = |text: &str| {
            Ok(StreamChunk {
                content: Some(text.to_string()),
                ..StreamChunk::default()
            })
        };
        match answer {
            Answer::Chunks(parts) => {
                for part in parts {
                    tx.try_send(delta(part)).unwrap();
                }
                tx.try_send(Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .unwrap();
            }
            Answer::FailAfter(parts, err) => {
                for part in parts {
                    tx.try_send(delta(part)).unwrap();
                }
                tx.try_send(Err(err)).unwrap();
            }
            Answer::Hold => self.held.lock().unwrap().push(tx),
        }
        Ok(rx)
    }
}

struct StaticStore {
    docs: Vec<Document>,
    queries: Mutex<Vec<(String, usize)>>,
    failure: Option<RetrievalError>,
    delay: Option<Duration>,
}

impl StaticStore {
    fn new(docs: Vec<Document>) -> Self {
        Self {
            docs,
            queries: Mutex::new(Vec::new()),
            failure: None,
            delay: None,
        }
    }

    fn failing(err: RetrievalError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new(vec![])
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }
}

#[async_trait]
impl VectorStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .docs
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, doc)| ScoredDocument {
                document: doc.clone(),
                score: 1.0 - i as f32 * 0.1,
            })
            .collect())
    }
}

fn actor_docs() -> Vec<Document> {
    vec![
        Document::new("Actors are serverless cloud programs that run on the Apify platform.")
            .with_title("Apify Actors")
            .with_url("https://docs.apify.com/actors"),
        Document::new("You can run an Actor from Apify Console, the API or the CLI.")
            .with_title("Running Actors")
            .with_url("https://docs.apify.com/actors/running"),
    ]
}

fn pipeline(provider: Arc<ScriptedProvider>, store: Arc<StaticStore>) -> RagPipeline {
    RagPipeline::new(provider, store, Arc::new(WordCounter), PipelineConfig::default()).unwrap()
}

// ── End to end ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_what_is_an_actor() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is an Actor?"],
        vec![Answer::Chunks(vec![
            "An Actor is a serverless program that runs on the Apify platform. ",
            "[Apify Actors](https://docs.apify.com/actors)",
        ])],
    ));
    let store = Arc::new(StaticStore::new(actor_docs()));
    let rag = pipeline(provider.clone(), store.clone());
    let mut session = rag.new_session();

    let question = "What is an Actor?";
    rag.check_query(question).unwrap();

    let mut trace = TurnTrace::default();
    let stream = rag
        .process(&session, question, Some(&mut trace))
        .await
        .unwrap();
    assert_eq!(stream.state(), TurnState::AnswerStreaming);

    let answer = stream.collect_answer().await.unwrap();
    assert_eq!(
        answer,
        "An Actor is a serverless program that runs on the Apify platform. \
         [Apify Actors](https://docs.apify.com/actors)"
    );
    assert!(answer.contains("[Apify Actors](https://docs.apify.com/actors)"));

    // Retrieval saw the standalone question with the configured k.
    assert_eq!(
        store.queries.lock().unwrap().as_slice(),
        &[("What is an Actor?".to_string(), 5)]
    );

    // The answer prompt carries the assembled context and the greeting.
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains(
        "Context: Page title: Apify Actors, url: https://docs.apify.com/actors, snippet: Actors are serverless"
    ));
    assert!(prompts[1].contains("Chat history: AI: **Welcome"));
    assert!(prompts[1].contains("Question: What is an Actor?\n"));

    assert_eq!(trace.standalone_question.as_deref(), Some("What is an Actor?"));
    assert_eq!(trace.documents, actor_docs());

    rag.save_turn(&mut session, question, &answer);
    let turns = session.memory().load();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].answer, WELCOME);
    assert_eq!(turns[1].question, "What is an Actor?");
    assert_eq!(turns[1].answer, answer);
}

#[tokio::test]
async fn follow_up_is_rewritten_before_retrieval() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is an Actor?", "How do I run an Actor?"],
        vec![
            Answer::Chunks(vec!["An Actor is a serverless program."]),
            Answer::Chunks(vec!["Click Start in Apify Console."]),
        ],
    ));
    let store = Arc::new(StaticStore::new(actor_docs()));
    let rag = pipeline(provider.clone(), store.clone());
    let mut session = rag.new_session();

    let first = rag
        .process(&session, "What is an Actor?", None)
        .await
        .unwrap()
        .collect_answer()
        .await
        .unwrap();
    rag.save_turn(&mut session, "What is an Actor?", &first);

    let mut trace = TurnTrace::default();
    let second = rag
        .process(&session, "How do I run it?", Some(&mut trace))
        .await
        .unwrap()
        .collect_answer()
        .await
        .unwrap();

    assert_eq!(second, "Click Start in Apify Console.");
    assert_eq!(store.queries(), vec!["What is an Actor?", "How do I run an Actor?"]);
    assert_eq!(trace.standalone_question.as_deref(), Some("How do I run an Actor?"));

    let prompts = provider.prompts();
    // Second rewrite prompt: history includes the first turn, raw follow-up last.
    assert!(prompts[2].contains("Human: What is an Actor?\nAI: An Actor is a serverless program."));
    assert!(prompts[2].contains("Follow Up Input: How do I run it?"));
    // Second answer prompt asks the standalone question.
    assert!(prompts[3].contains("Question: How do I run an Actor?\n"));
}

#[tokio::test]
async fn standalone_question_is_passed_through_unchanged() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is Apify Proxy?"],
        vec![Answer::Chunks(vec!["A proxy service."])],
    ));
    let store = Arc::new(StaticStore::new(actor_docs()));
    let rag = pipeline(provider, store.clone());
    let session = rag.new_session();

    rag.process(&session, "What is Apify Proxy?", None)
        .await
        .unwrap()
        .collect_answer()
        .await
        .unwrap();
    assert_eq!(store.queries(), vec!["What is Apify Proxy?"]);
}

#[tokio::test]
async fn retrieval_order_reaches_the_prompt() {
    let docs: Vec<Document> = (1..=5)
        .map(|i| Document::new(format!("chunk-{i}")).with_title(format!("Page {i}")))
        .collect();
    let provider = Arc::new(ScriptedProvider::new(
        vec!["q"],
        vec![Answer::Chunks(vec!["a"])],
    ));
    let rag = pipeline(provider.clone(), Arc::new(StaticStore::new(docs)));
    let session = rag.new_session();

    rag.process(&session, "q", None)
        .await
        .unwrap()
        .collect_answer()
        .await
        .unwrap();

    let prompt = &provider.prompts()[1];
    let positions: Vec<usize> = (1..=5)
        .map(|i| prompt.find(&format!("snippet: chunk-{i}")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

// ── Trace ────────────────────────────────────────────────────────────────

/// Appends every event to a shared log.
struct LogSink(Arc<Mutex<Vec<String>>>);

impl TraceSink for LogSink {
    fn standalone_question(&mut self, question: &str) {
        self.0.lock().unwrap().push(format!("standalone:{question}"));
    }

    fn retrieved_documents(&mut self, docs: &[Document]) {
        self.0.lock().unwrap().push(format!("documents:{}", docs.len()));
    }
}

#[tokio::test]
async fn trace_arrives_before_first_chunk() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is an Actor?"],
        vec![Answer::Chunks(vec!["An ", "Actor"])],
    ));
    let rag = pipeline(provider, Arc::new(StaticStore::new(actor_docs())));
    let session = rag.new_session();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sink = LogSink(log.clone());
    let mut stream = rag
        .process(&session, "What is an Actor?", Some(&mut sink))
        .await
        .unwrap();

    while let Some(chunk) = stream.next().await {
        log.lock().unwrap().push(format!("chunk:{}", chunk.unwrap()));
    }

    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[
            "standalone:What is an Actor?".to_string(),
            "documents:2".to_string(),
            "chunk:An ".to_string(),
            "chunk:Actor".to_string(),
        ]
    );
    assert_eq!(stream.state(), TurnState::TurnComplete);
}

#[tokio::test]
async fn debug_record_is_kept_per_completed_turn() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is an Actor?"],
        vec![Answer::Chunks(vec!["A program."])],
    ));
    let rag = pipeline(provider, Arc::new(StaticStore::new(actor_docs())));
    let mut session = rag.new_session();

    let mut trace = TurnTrace::default();
    let answer = rag
        .process(&session, "What is it?", Some(&mut trace))
        .await
        .unwrap()
        .collect_answer()
        .await
        .unwrap();
    rag.save_turn(&mut session, "What is it?", &answer);
    session.record_debug(trace.into_record("What is it?", &answer));

    let record = session.debug_trace().last().unwrap();
    assert_eq!(record.label(), "What is it? / What is an Actor?");
    assert!(record.rendered_context.contains("**url**:https://docs.apify.com/actors"));

    session.clear();
    assert!(session.debug_trace().is_empty());
    assert_eq!(session.memory().len(), 1);
}

// ── Failures ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn generation_failure_leaves_memory_untouched() {
    let provider = Arc::new(ScriptedProvider::new(
        vec!["What is an Actor?"],
        vec![Answer::FailAfter(
            vec!["An Actor is"],
            ProviderError::StreamInterrupted("connection reset".into()),
        )],
    ));
    let rag = pipeline(provider, Arc::new(StaticStore::new(actor_docs())));
    let session = rag.new_session();
    let before = session.memory().render();

    let mut stream = rag.process(&session, "What is an Actor?", None).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "An Actor is");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.is_upstream());
    assert!(matches!(err, Error::Provider(ProviderError::StreamInterrupted(_))));
    assert_eq!(stream.state(), TurnState::TurnFailed);
    assert_eq!(stream.answer(), "An Actor is");
    assert!(stream.next().await.is_none());

    assert_eq!(session.memory().render(), before);
    assert_eq!(session.memory().len(), 1);
}

#[tokio::test]
async fn retrieval_failure_abandons_the_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec!["What is an Actor?"], vec![]));
    let store = Arc::new(StaticStore::failing(RetrievalError::IndexNotFound(
        "apify-doc-platform".into(),
    )));
    let rag = pipeline(provider.clone(), store);
    let session = rag.new_session();

    let mut trace = TurnTrace::default();
    let err = rag
        .process(&session, "What is an Actor?", Some(&mut trace))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Retrieval(RetrievalError::IndexNotFound(_))));
    assert!(err.is_upstream());
    // Rewrite happened, generation never started.
    assert_eq!(provider.prompts().len(), 1);
    assert_eq!(trace.standalone_question.as_deref(), Some("What is an Actor?"));
    assert!(trace.documents.is_empty());
    assert_eq!(session.memory().len(), 1);
}

#[tokio::test]
async fn rewrite_failure_surfaces_provider_error() {
    let provider = Arc::new(ScriptedProvider {
        rewrites: Mutex::new(VecDeque::from([Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })])),
        ..ScriptedProvider::new(vec![], vec![])
    });
    let store = Arc::new(StaticStore::new(actor_docs()));
    let rag = pipeline(provider, store.clone());
    let session = rag.new_session();

    let err = rag.process(&session, "q", None).await.err().unwrap();
    assert!(matches!(err, Error::Provider(ProviderError::RateLimited { .. })));
    assert!(store.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_rewrite_times_out() {
    let provider = Arc::new(
        ScriptedProvider::new(vec!["q"], vec![]).with_rewrite_delay(Duration::from_secs(60)),
    );
    let store = Arc::new(StaticStore::new(actor_docs()));
    let rag = pipeline(provider, store.clone());
    let session = rag.new_session();

    let err = rag.process(&session, "q", None).await.err().unwrap();
    assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
    assert!(store.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_retrieval_times_out() {
    let provider = Arc::new(ScriptedProvider::new(vec!["q"], vec![]));
    let store = Arc::new(StaticStore {
        delay: Some(Duration::from_secs(30)),
        ..StaticStore::new(actor_docs())
    });
    let config = PipelineConfig {
        retrieval_timeout: Duration::from_secs(2),
        ..PipelineConfig::default()
    };
    let rag = RagPipeline::new(provider, store, Arc::new(WordCounter), config).unwrap();
    let session = rag.new_session();

    let err = rag.process(&session, "q", None).await.err().unwrap();
    assert!(matches!(err, Error::Retrieval(RetrievalError::Timeout(_))));
}

#[tokio::test(start_paused = true)]
async fn stalled_answer_stream_times_out() {
    let provider = Arc::new(ScriptedProvider::new(vec!["q"], vec![Answer::Hold]));
    let rag = pipeline(provider.clone(), Arc::new(StaticStore::new(actor_docs())));
    let session = rag.new_session();

    let mut stream = rag.process(&session, "q", None).await.unwrap();
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
    assert_eq!(stream.state(), TurnState::TurnFailed);
    assert_eq!(provider.held_senders().len(), 1);
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec!["q"], vec![Answer::Hold]));
    let rag = pipeline(provider.clone(), Arc::new(StaticStore::new(actor_docs())));
    let session = rag.new_session();

    let stream = rag.process(&session, "q", None).await.unwrap();
    let sender = provider.held_senders().pop().unwrap();
    assert!(!sender.is_closed());

    drop(stream);
    assert!(sender.is_closed());
    assert_eq!(session.memory().len(), 1);
}

#[tokio::test]
async fn stream_closed_without_final_chunk_is_interrupted() {
    let provider = Arc::new(ScriptedProvider::new(vec!["q"], vec![Answer::Hold]));
    let rag = pipeline(provider.clone(), Arc::new(StaticStore::new(actor_docs())));
    let session = rag.new_session();

    let mut stream = rag.process(&session, "q", None).await.unwrap();
    provider.held.lock().unwrap().clear();

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::StreamInterrupted(_))));
}

// ── Budget ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_budget_is_exact() {
    let provider = Arc::new(ScriptedProvider::new(vec![], vec![]));
    let rag = pipeline(provider, Arc::new(StaticStore::new(vec![])));

    let [rag_prompt, standalone_prompt] = rag.prompts();
    let prompt_tokens =
        WordCounter.count(rag_prompt.template()) + WordCounter.count(standalone_prompt.template());
    let expected = 16385 - 5 * 500 - 1200 - prompt_tokens - 500;

    assert_eq!(rag.budget().prompt_template_tokens, prompt_tokens);
    assert_eq!(rag.max_query_tokens(), expected);

    let at_limit = vec!["word"; expected].join(" ");
    assert!(rag.check_query(&at_limit).is_ok());

    let over_limit = vec!["word"; expected + 1].join(" ");
    match rag.check_query(&over_limit) {
        Err(Error::BudgetExceeded { tokens, max }) => {
            assert_eq!(tokens, expected + 1);
            assert_eq!(max, expected);
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
}

#[test]
fn window_too_small_is_config_error() {
    let provider = Arc::new(ScriptedProvider::new(vec![], vec![]));
    let config = PipelineConfig {
        context_window_tokens: 4096,
        ..PipelineConfig::default()
    };
    let result = RagPipeline::new(
        provider,
        Arc::new(StaticStore::new(vec![])),
        Arc::new(WordCounter),
        config,
    );
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn zero_top_k_is_config_error() {
    let provider = Arc::new(ScriptedProvider::new(vec![], vec![]));
    let config = PipelineConfig {
        top_k: 0,
        ..PipelineConfig::default()
    };
    let result = RagPipeline::new(
        provider,
        Arc::new(StaticStore::new(vec![])),
        Arc::new(WordCounter),
        config,
    );
    assert!(matches!(result, Err(Error::Config { .. })));
}

// ── Memory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn memory_stays_bounded_across_turns() {
    let answers: Vec<Answer> = (0..30)
        .map(|_| Answer::Chunks(vec!["a b c d e f g h i j k l m n o p q r s t"]))
        .collect();
    let rewrites: Vec<&str> = (0..30).map(|_| "q").collect();
    let provider = Arc::new(ScriptedProvider::new(rewrites, answers));
    let config = PipelineConfig {
        history_max_tokens: 100,
        ..PipelineConfig::default()
    };
    let rag = RagPipeline::new(
        provider,
        Arc::new(StaticStore::new(actor_docs())),
        Arc::new(WordCounter),
        config,
    )
    .unwrap();
    let mut session = rag.new_session();

    for i in 0..30 {
        let question = format!("question number {i}");
        let answer = rag
            .process(&session, &question, None)
            .await
            .unwrap()
            .collect_answer()
            .await
            .unwrap();
        rag.save_turn(&mut session, &question, &answer);

        let memory = session.memory();
        assert!(memory.token_count() <= 100);
        assert_eq!(memory.load().last().unwrap().question, question);
    }
    // The greeting was evicted long ago.
    assert!(session.memory().load().iter().all(|t| !t.question.is_empty()));
}
