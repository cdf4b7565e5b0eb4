use git2::{DiffOptions, Patch};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    GitOperationFailed(#[from] git2::Error),
}

/// Line statistics for a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub hunks: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// A unified patch together with its statistics
#[derive(Debug, Clone, Default)]
pub struct CapturedDiff {
    pub patch: String,
    pub summary: DiffSummary,
}

/// Computes unified diffs between two in-memory document revisions
#[derive(Debug, Clone)]
pub struct TextDiff {
    context_lines: u32,
    old_label: String,
    new_label: String,
}

impl Default for TextDiff {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDiff {
    pub fn new() -> Self {
        Self {
            context_lines: 3,
            old_label: "original".to_string(),
            new_label: "improved".to_string(),
        }
    }

    pub fn with_context_lines(mut self, lines: u32) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn with_labels(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_label = old.into();
        self.new_label = new.into();
        self
    }

    /// Diff `before` against `after`, returning the patch text and stats
    pub fn capture(&self, before: &str, after: &str) -> Result<CapturedDiff, GitError> {
        let mut opts = DiffOptions::new();
        opts.context_lines(self.context_lines);

        let mut patch = Patch::from_buffers(
            before.as_bytes(),
            Some(Path::new(&self.old_label)),
            after.as_bytes(),
            Some(Path::new(&self.new_label)),
            Some(&mut opts),
        )?;

        let (_context, insertions, deletions) = patch.line_stats()?;
        let summary = DiffSummary {
            hunks: patch.num_hunks(),
            insertions,
            deletions,
        };

        let buf = patch.to_buf()?;
        let text = String::from_utf8_lossy(&buf).into_owned();

        debug!(
            diff_len = text.len(),
            insertions, deletions, "Captured document diff"
        );

        Ok(CapturedDiff {
            patch: text,
            summary,
        })
    }

    /// Only the statistics of the diff
    pub fn summary(&self, before: &str, after: &str) -> Result<DiffSummary, GitError> {
        Ok(self.capture(before, after)?.summary)
    }
}
