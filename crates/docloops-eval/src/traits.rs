use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EvaluationResult, Metadata};

/// Errors an evaluator backend can report
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to parse evaluation response: {0}")]
    Parse(#[from] crate::response::ResponseParseError),
}

/// Errors an improver backend can report
#[derive(Error, Debug)]
pub enum ImproveError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Improver returned no content")]
    EmptyRewrite,
}

/// Produces a structured quality score for a document.
///
/// Implementations should be deterministic enough that results can be cached
/// by content fingerprint (see [`crate::CachingEvaluator`]).
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(
        &self,
        content: &str,
        doc_type: &str,
        metadata: &Metadata,
    ) -> Result<EvaluationResult, EvaluationError>;
}

/// Produces a revised document from an evaluation and focus areas.
///
/// Returns the full rewritten text; callers treat it as opaque and compute
/// their own diff statistics over it.
#[async_trait]
pub trait Improver: Send + Sync {
    fn name(&self) -> &str;

    async fn improve(
        &self,
        content: &str,
        evaluation: &EvaluationResult,
        focus_areas: &[String],
        metadata: &Metadata,
    ) -> Result<String, ImproveError>;
}
