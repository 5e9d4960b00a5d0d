//! # Docbot Core
//!
//! Domain types, traits, and error definitions for the Docbot documentation
//! assistant. This crate has **zero framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping backends via configuration (Pinecone, OpenSearch, any
//!   OpenAI-compatible endpoint)
//! - Easy testing with scripted providers and static vector stores
//! - Clean dependency graph (all crates depend inward on core)

pub mod document;
pub mod error;
pub mod message;
pub mod provider;
pub mod token;
pub mod turn;
pub mod vector_store;

// Re-export key types at crate root for ergonomics
pub use document::{Document, DocumentMetadata, RetrievalResult, ScoredDocument};
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use token::{HeuristicCounter, TokenCounter};
pub use turn::ConversationTurn;
pub use vector_store::VectorStore;
