use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HelpdeskError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// The documentation corpus. Loaded once at startup and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    docs: Vec<Document>,
}

impl DocumentSet {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    /// Load a JSON array of `{title, content}` objects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HelpdeskError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let set = Self::from_json(&raw)
            .map_err(|e| HelpdeskError::Docs(format!("{}: {}", path.display(), e)))?;

        if set.is_empty() {
            tracing::warn!(path = %path.display(), "Documentation corpus is empty");
        } else {
            tracing::info!(path = %path.display(), documents = set.len(), "Loaded documentation corpus");
        }
        Ok(set)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let docs: Vec<Document> = serde_json::from_str(raw)?;
        Ok(Self { docs })
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
