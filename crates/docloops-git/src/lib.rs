//! # docloops-git
//!
//! Diffs between document revisions, computed in memory with libgit2.
//!
//! Every improvement step records a unified patch of what the improver
//! changed, together with insertion / deletion counts.
//!
//! ## Usage
//!
//! ```rust
//! use docloops_git::TextDiff;
//!
//! let diff = TextDiff::new().capture("old\n", "new\n").unwrap();
//! assert_eq!(diff.summary.insertions, 1);
//! assert_eq!(diff.summary.deletions, 1);
//! ```

mod diff;

pub use diff::{CapturedDiff, DiffSummary, GitError, TextDiff};
