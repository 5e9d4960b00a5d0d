//! Retrieved documents.
//!
//! A [`Document`] is a chunk of the documentation corpus as stored in the
//! vector index: its text plus whatever metadata was indexed alongside it.
//! Only `title` and `url` are interpreted; anything else is carried through
//! untouched.

use serde::{Deserialize, Serialize};

/// Metadata stored next to a chunk in the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Page title of the source page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// URL of the source page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Remaining backend-specific fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A retrieved chunk of documentation. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The chunk text
    pub content: String,

    /// Indexed metadata
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    /// Set the page URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.metadata.url = Some(url.into());
        self
    }

    /// Page title, empty when absent.
    pub fn title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or_default()
    }

    /// Page URL, empty when absent.
    pub fn url(&self) -> &str {
        self.metadata.url.as_deref().unwrap_or_default()
    }
}

/// A document paired with its similarity score (higher is more similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Documents ordered by descending similarity. Order matters: it decides
/// which context the model reads first.
pub type RetrievalResult = Vec<Document>;
