use chrono::{DateTime, Utc};
use docloops_eval::{EvaluationResult, Grade, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single recorded evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub doc_type: String,
    pub doc_id: String,
    pub score: u32,
    pub max_score: u32,
    pub grade: Grade,
    pub evaluation: EvaluationResult,
    pub content_hash: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single improvement step with its score change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub doc_type: String,
    pub doc_id: String,
    pub score_before: u32,
    pub score_after: u32,
    /// `score_after - score_before`
    pub improvement: i64,
    pub content_before_hash: Option<String>,
    pub content_after_hash: Option<String>,
    #[serde(default)]
    pub details: Metadata,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Summary of a complete evaluate/improve cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub doc_type: String,
    pub doc_id: String,
    pub iteration_count: usize,
    /// Initial score followed by the score after each iteration
    pub score_trajectory: Vec<u32>,
    pub initial_score: u32,
    pub final_score: u32,
    pub total_improvement: i64,
    pub stop_reason: String,
    pub initial_content_hash: Option<String>,
    pub final_content_hash: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Arguments for [`crate::HistoryStore::add_evaluation`]
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub doc_type: &'a str,
    pub doc_id: &'a str,
    pub evaluation: &'a EvaluationResult,
    pub content: Option<&'a str>,
    pub metadata: &'a Metadata,
}

/// Arguments for [`crate::HistoryStore::add_improvement`]
#[derive(Debug, Clone, Copy)]
pub struct ImprovementInput<'a> {
    pub doc_type: &'a str,
    pub doc_id: &'a str,
    pub score_before: u32,
    pub score_after: u32,
    pub content_before: Option<&'a str>,
    pub content_after: Option<&'a str>,
    pub details: &'a Metadata,
    pub metadata: &'a Metadata,
}

/// Arguments for [`crate::HistoryStore::add_cycle`]
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    pub doc_type: &'a str,
    pub doc_id: &'a str,
    pub score_trajectory: &'a [u32],
    pub final_score: u32,
    pub stop_reason: &'a str,
    pub initial_content: Option<&'a str>,
    pub final_content: Option<&'a str>,
    pub metadata: &'a Metadata,
}

/// Ordering applied to query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Most recent first
    #[default]
    Newest,
    /// Highest score first
    Score,
    /// Largest score gain first
    Improvement,
}

/// Filter and ordering for history queries
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub doc_type: Option<String>,
    pub doc_id: Option<String>,
    /// `None` or `Some(0)` returns everything
    pub limit: Option<usize>,
    pub sort_by: SortBy,
}

impl HistoryQuery {
    pub fn for_document(doc_type: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
            doc_id: Some(doc_id.into()),
            ..Default::default()
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub(crate) fn matches(&self, doc_type: &str, doc_id: &str) -> bool {
        self.doc_type.as_deref().map_or(true, |t| t == doc_type)
            && self.doc_id.as_deref().map_or(true, |d| d == doc_id)
    }
}

/// Aggregate statistics over the whole history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryMetrics {
    pub total_evaluations: usize,
    pub total_improvements: usize,
    pub total_cycles: usize,
    pub average_evaluation_score: f64,
    pub average_improvement: f64,
    /// Up to five documents with the largest summed improvement
    pub most_improved_documents: Vec<DocumentImprovement>,
    pub by_doc_type: BTreeMap<String, DocTypeMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentImprovement {
    /// `doc_type:doc_id`
    pub doc: String,
    pub total_improvement: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocTypeMetrics {
    pub evaluations: usize,
    pub improvements: usize,
    pub cycles: usize,
    pub average_score: f64,
    pub average_improvement: f64,
}

/// Score at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub score: u32,
}

/// Everything recorded for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHistory {
    pub doc_type: String,
    pub doc_id: String,
    /// Newest first
    pub evaluations: Vec<EvaluationEntry>,
    pub improvements: Vec<ImprovementEntry>,
    pub cycles: Vec<CycleEntry>,
    /// Evaluation scores, oldest first
    pub timeline: Vec<TimelinePoint>,
    pub first_evaluated: Option<DateTime<Utc>>,
    pub last_evaluated: Option<DateTime<Utc>>,
    pub initial_score: Option<u32>,
    pub latest_score: Option<u32>,
    pub total_improvement: i64,
    pub average_improvement: f64,
}
