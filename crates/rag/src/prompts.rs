//! Instruction prompts and fixed user-facing messages.
//!
//! Templates use `{name}` placeholders. Rendering is a single left-to-right
//! pass: substituted values are never scanned again, so braces inside a
//! retrieved document or a user question come through verbatim.

use std::fmt;

/// Grounded-answer instructions.
pub const RAG_TEMPLATE: &str = "\
You are smart and helpful assistant for the Apify Platform Documentation (referred as documentation).
You have extensive knowledge about Apify and always answer questions as helpfully as possible.

Given the chat history and the following context, answer the question at the end.
Your responses should adhere to clarity and readability standards and must be devoid of any harmful content.
You are limited to answering questions about the Apify and Apify's platform documentation.
If a question is unclear or beyond the documentation scope yet relevant to Apify, offer general guidance where feasible.
For questions beyond your knowledge, recommend next steps or resources rather than leaving the query unanswered.

Remember, always include an URL to the source of the context in your responses, formatted in markdown as [Page title](url).

Chat history: {chat_history}

Context: {context}

Question: {question}

Helpful Answer:
";

/// Follow-up to standalone question instructions.
pub const STANDALONE_QUESTION_TEMPLATE: &str = "\
Given the following conversation, decide whether the user utterance is a statement, standalone
question, or a follow up question.
If the utterance is statement or standalone question, just repeat it.
If the question is a follow up, rephrase it as a standalone question, in its original language.
Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:
";

/// How one retrieved document is presented inside the context block.
pub const DOCUMENT_TEMPLATE: &str = "Page title: {title}, url: {url}, snippet: {page_content}";

/// Greeting seeded into every new session.
pub const WELCOME: &str = "**Welcome to the Apify's Platform documentation Assistant!** \
Just type your question below for detailed support on the Apify Platform.\nWhat can I help you with?";

/// Shown instead of an answer when a turn fails upstream.
pub const RESPONSE_ERROR: &str =
    "We are sorry, we are encountering difficulties providing an appropriate response. Please try again.";

/// Shown when a question does not fit the query budget.
pub const QUERY_TOO_LONG: &str =
    "Your query is too long, exceeding LLM context window limit, please rephrase";

/// A prompt with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    template: String,
}

impl PromptTemplate {
    pub fn new(name: &'static str, template: impl Into<String>) -> Self {
        Self {
            name,
            template: template.into(),
        }
    }

    pub fn rag() -> Self {
        Self::new("rag", RAG_TEMPLATE)
    }

    pub fn standalone_question() -> Self {
        Self::new("standalone_question", STANDALONE_QUESTION_TEMPLATE)
    }

    pub fn document() -> Self {
        Self::new("document", DOCUMENT_TEMPLATE)
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The unrendered template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        let mut rest = self.template.as_str();
        while let Some((name, after)) = next_placeholder(rest) {
            if let Some(name) = name {
                if !vars.contains(&name) {
                    vars.push(name);
                }
            }
            rest = after;
        }
        vars
    }

    /// Substitute `{name}` placeholders. Placeholders without a value are
    /// left as they are.
    pub fn format(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            match tail.find('}') {
                Some(close) if is_identifier(&tail[1..close]) => {
                    let name = &tail[1..close];
                    match values.iter().find(|(k, _)| *k == name) {
                        Some((_, value)) => out.push_str(value),
                        None => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Find the next `{…}` in `text`. Returns the placeholder name (if it is a
/// valid identifier) and the text after it.
fn next_placeholder(text: &str) -> Option<(Option<&str>, &str)> {
    let open = text.find('{')?;
    let tail = &text[open..];
    match tail.find('}') {
        Some(close) if is_identifier(&tail[1..close]) => Some((Some(&tail[1..close]), &tail[close + 1..])),
        _ => Some((None, &tail[1..])),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
