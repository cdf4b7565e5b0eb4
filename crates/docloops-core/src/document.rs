use docloops_eval::{short_fingerprint, Metadata};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A document submitted to a cycle.
///
/// Treated as an immutable value: improvement produces a new `Document`
/// through [`Document::revised`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub doc_type: String,
    pub filename: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            doc_type: doc_type.into(),
            filename: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stable identifier used in history: the filename when known, otherwise
    /// a short content fingerprint
    pub fn doc_id(&self) -> String {
        match &self.filename {
            Some(filename) => filename.clone(),
            None => short_fingerprint(&self.content),
        }
    }

    /// Same document with new content
    pub fn revised(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.content)
    }
}

/// Document type for a path: `README.md` is a readme, anything under a
/// path mentioning `wiki` is a wiki page, everything else is markdown
pub fn infer_doc_type(path: &Path) -> &'static str {
    let is_readme = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("readme.md"));

    if is_readme {
        "readme"
    } else if path.to_string_lossy().to_lowercase().contains("wiki") {
        "wiki"
    } else {
        "markdown"
    }
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
