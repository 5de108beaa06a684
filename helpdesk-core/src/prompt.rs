//! System prompt assembly from the documentation corpus.
//!
//! The rendered block is the only grounding the model gets: it is told to
//! answer from this text alone and to reply with [`REFUSAL`] otherwise.
//! Rendering is a pure function of the documents.

use crate::models::Document;

/// Exact reply the model is instructed to give for undocumented questions.
pub const REFUSAL: &str = "Sorry, I don't have information about that.";

const PREAMBLE: &str =
    "You are a helpful support assistant. Answer ONLY based on the provided documentation.";

const NO_INVENTION: &str =
    "Do not make up information. Do not guess. Only use what is in the documentation below.";

const DOCS_DIVIDER: &str = "--- Documentation ---";

/// `## {title}\n{content}` per document, separated by a blank line.
pub fn render_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|doc| format!("## {}\n{}", doc.title, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_system_prompt(docs: &[Document]) -> String {
    format!(
        "{PREAMBLE}\n\nIf the question cannot be answered from the docs, respond exactly: {REFUSAL}\n\n{NO_INVENTION}\n\n{DOCS_DIVIDER}\n\n{}",
        render_documents(docs)
    )
}
