//! Context assembly: retrieved documents into one prompt block.

use docbot_core::Document;

use crate::prompts::PromptTemplate;

const DOCUMENT_SEPARATOR: &str = "\n\n";
const DEBUG_RULE: &str = "--------------------------------";

/// Formats retrieved documents for the answer prompt. Order is preserved;
/// absent titles or urls render empty.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    document_prompt: PromptTemplate,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            document_prompt: PromptTemplate::document(),
        }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assemble(&self, docs: &[Document]) -> String {
        docs.iter()
            .map(|doc| {
                self.document_prompt.format(&[
                    ("title", doc.title()),
                    ("url", doc.url()),
                    ("page_content", &doc.content),
                ])
            })
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR)
    }
}

/// Markdown rendering of the retrieved documents for the debug view.
pub fn render_debug_markdown(docs: &[Document]) -> String {
    docs.iter()
        .map(|doc| {
            format!(
                "**title**: {}\n\n**url**:{}\n\n**content**:{}\n\n{DEBUG_RULE}\n\n",
                doc.title(),
                doc.url(),
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
