//! LLM provider implementations for Docbot.
//!
//! All providers implement the `docbot_core::Provider` trait.
//! [`build_from_config`] creates the provider the configuration asks for.

pub mod openai_compat;

pub use openai_compat::{build_from_config, OpenAiCompatProvider};
