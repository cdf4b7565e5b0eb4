use chrono::{DateTime, Utc};
use docloops_eval::{EvaluationResult, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::word_count;
use crate::improvement::{ImprovementDetails, ImprovementResult};

/// Why a cycle stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Score reached the requested target
    TargetReached,
    /// Last iteration gained no more than `min_improvement`
    InsufficientImprovement,
    MaxIterations,
    /// Score reached the absolute ceiling
    ScoreCeiling,
    ImproverFailed,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TargetReached => "target_reached",
            StopReason::InsufficientImprovement => "insufficient_improvement",
            StopReason::MaxIterations => "max_iterations",
            StopReason::ScoreCeiling => "score_ceiling",
            StopReason::ImproverFailed => "improver_failed",
            StopReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// One completed improve/re-evaluate step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based
    pub index: usize,
    pub content_before: String,
    pub content_after: String,
    pub eval_before: EvaluationResult,
    pub eval_after: EvaluationResult,
    pub improvement_details: ImprovementDetails,
}

impl IterationRecord {
    pub fn score_delta(&self) -> i64 {
        i64::from(self.eval_after.total_score) - i64::from(self.eval_before.total_score)
    }

    pub fn to_improvement_result(&self) -> ImprovementResult {
        ImprovementResult {
            original_content: self.content_before.clone(),
            improved_content: self.content_after.clone(),
            details: self.improvement_details.clone(),
            eval_before: self.eval_before.clone(),
            eval_after: Some(self.eval_after.clone()),
        }
    }
}

/// An improvement attempt that produced no usable rewrite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub index: usize,
    pub score_before: u32,
    pub focus_areas: Vec<String>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a full cycle.
///
/// `final_content` is always the best-scoring content seen, so
/// `final_score >= initial_score` holds for every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_id: String,
    pub doc_type: String,
    pub doc_id: String,
    pub iterations: Vec<IterationRecord>,
    pub initial_content: String,
    pub final_content: String,
    pub initial_score: u32,
    pub final_score: u32,
    /// Absent only when the cycle was cancelled before the first evaluation
    pub initial_evaluation: Option<EvaluationResult>,
    pub final_evaluation: Option<EvaluationResult>,
    pub stop_reason: StopReason,
    pub failed_attempt: Option<FailedAttempt>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CycleRecord {
    pub fn total_improvement(&self) -> i64 {
        i64::from(self.final_score) - i64::from(self.initial_score)
    }

    pub fn improved(&self) -> bool {
        self.final_score > self.initial_score
    }

    /// Initial score followed by the score after each iteration
    pub fn score_trajectory(&self) -> Vec<u32> {
        std::iter::once(self.initial_score)
            .chain(self.iterations.iter().map(|i| i.eval_after.total_score))
            .collect()
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let iterations = self.iterations.len();
        let total_improvement = self.total_improvement() as f64;
        let initial_words = word_count(&self.initial_content) as f64;
        let final_words = word_count(&self.final_content) as f64;

        BTreeMap::from([
            ("iterations".to_string(), iterations as f64),
            ("initial_score".to_string(), f64::from(self.initial_score)),
            ("final_score".to_string(), f64::from(self.final_score)),
            ("total_improvement".to_string(), total_improvement),
            (
                "improvement_per_iteration".to_string(),
                if iterations > 0 { total_improvement / iterations as f64 } else { 0.0 },
            ),
            ("initial_word_count".to_string(), initial_words),
            ("final_word_count".to_string(), final_words),
            ("word_count_change".to_string(), final_words - initial_words),
        ])
    }

    /// Markdown summary: scores, trajectory table, per-iteration deltas
    pub fn format_report(&self) -> String {
        let title = format!("# Improvement Cycle: {}", self.cycle_id);
        let mut lines = vec![title, String::new()];

        lines.push(format!("- Document: {} ({})", self.doc_id, self.doc_type));
        lines.push(format!("- Iterations: {}", self.iterations.len()));
        lines.push(format!("- Stopped: {}", self.stop_reason));
        lines.push(format!("- Started: {}", self.started_at.to_rfc3339()));
        lines.push(format!("- Duration: {:.1}s", self.duration_secs()));
        lines.push(String::new());

        lines.push(format!("Initial Score: {}", self.initial_score));
        lines.push(format!("Final Score: {}", self.final_score));
        lines.push(format!("Total Improvement: {:+} points", self.total_improvement()));
        lines.push(String::new());

        if !self.iterations.is_empty() {
            lines.push("## Score Trajectory".to_string());
            lines.push(String::new());
            lines.push("| Iteration | Before | After | Delta | Words |".to_string());
            lines.push("|-----------|--------|-------|-------|-------|".to_string());
            // The kept content is the earliest iteration that reached it
            let best_index = self
                .iterations
                .iter()
                .find(|iteration| {
                    iteration.content_after == self.final_content
                        && iteration.eval_after.total_score == self.final_score
                })
                .map(|iteration| iteration.index);
            for iteration in &self.iterations {
                let best = if Some(iteration.index) == best_index { " *" } else { "" };
                lines.push(format!(
                    "| {}{} | {} | {} | {:+} | {:+} |",
                    iteration.index,
                    best,
                    iteration.eval_before.total_score,
                    iteration.eval_after.total_score,
                    iteration.score_delta(),
                    iteration.improvement_details.word_count_change()
                ));
            }
            lines.push(String::new());
        }

        if let Some(failed) = &self.failed_attempt {
            lines.push("## Failed Attempt".to_string());
            lines.push(format!(
                "Iteration {} (from score {}): {}",
                failed.index, failed.score_before, failed.error
            ));
            lines.push(String::new());
        }

        if let Some(evaluation) = &self.final_evaluation {
            lines.push("## Final Evaluation".to_string());
            lines.push(format!("{}: {}", evaluation.grade, evaluation.summary));
            lines.push(String::new());
        }

        lines.join("\n")
    }
}
