//! # docloops-history
//!
//! Append-only record of evaluations, improvements and complete cycles,
//! persisted as three JSON files and queryable by document.
//!
//! Entries carry content fingerprints, never document text.

mod store;
mod types;

pub use store::{HistoryError, HistoryStore};
pub use types::{
    CycleEntry, CycleInput, DocTypeMetrics, DocumentHistory, DocumentImprovement,
    EvaluationEntry, EvaluationInput, HistoryMetrics, HistoryQuery, ImprovementEntry,
    ImprovementInput, SortBy, TimelinePoint,
};
