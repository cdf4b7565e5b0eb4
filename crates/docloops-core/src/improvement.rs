use chrono::{DateTime, Utc};
use docloops_eval::{display_name, EvaluationResult, Metadata};
use docloops_git::TextDiff;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::document::word_count;

/// What changed between two revisions of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementDetails {
    /// Unified diff, original to improved
    pub diff: String,
    pub original_length: usize,
    pub improved_length: usize,
    pub word_count_before: usize,
    pub word_count_after: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Focus areas the rewrite was asked to address
    pub addressed_recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ImprovementDetails {
    /// Measure the change from `before` to `after`. A failed diff is logged
    /// and leaves the patch and line counts empty.
    pub fn compute(before: &str, after: &str, focus_areas: &[String], differ: &TextDiff) -> Self {
        let diff = differ.capture(before, after).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to diff revisions");
            Default::default()
        });

        Self {
            diff: diff.patch,
            original_length: before.chars().count(),
            improved_length: after.chars().count(),
            word_count_before: word_count(before),
            word_count_after: word_count(after),
            lines_added: diff.summary.insertions,
            lines_removed: diff.summary.deletions,
            addressed_recommendations: focus_areas.to_vec(),
            timestamp: Utc::now(),
        }
    }

    pub fn word_count_change(&self) -> i64 {
        self.word_count_after as i64 - self.word_count_before as i64
    }

    /// Flattened form stored alongside history entries (without the patch)
    pub fn to_metadata(&self) -> Metadata {
        let mut details = Metadata::new();
        details.insert("original_length".into(), self.original_length.into());
        details.insert("improved_length".into(), self.improved_length.into());
        details.insert("word_count_before".into(), self.word_count_before.into());
        details.insert("word_count_after".into(), self.word_count_after.into());
        details.insert("lines_added".into(), self.lines_added.into());
        details.insert("lines_removed".into(), self.lines_removed.into());
        details.insert(
            "addressed_recommendations".into(),
            self.addressed_recommendations.clone().into(),
        );
        details
    }
}

/// One improvement step: the rewrite, what changed, and the scores on
/// either side of it (`eval_after` is absent until re-evaluated)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementResult {
    pub original_content: String,
    pub improved_content: String,
    pub details: ImprovementDetails,
    pub eval_before: EvaluationResult,
    pub eval_after: Option<EvaluationResult>,
}

impl ImprovementResult {
    pub fn with_eval_after(mut self, eval_after: EvaluationResult) -> Self {
        self.eval_after = Some(eval_after);
        self
    }

    /// Score change, once re-evaluated
    pub fn score_delta(&self) -> Option<i64> {
        self.eval_after
            .as_ref()
            .map(|after| i64::from(after.total_score) - i64::from(self.eval_before.total_score))
    }

    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        let before = f64::from(self.eval_before.total_score);
        metrics.insert("score_before".to_string(), before);

        if let Some(after) = &self.eval_after {
            let after = f64::from(after.total_score);
            metrics.insert("score_after".to_string(), after);
            metrics.insert("score_improvement".to_string(), after - before);
            metrics.insert(
                "score_improvement_percent".to_string(),
                if before > 0.0 { (after - before) / before * 100.0 } else { 0.0 },
            );
        }

        let words_before = self.details.word_count_before as f64;
        metrics.insert("original_word_count".to_string(), words_before);
        metrics.insert("improved_word_count".to_string(), self.details.word_count_after as f64);
        metrics.insert("word_count_change".to_string(), self.details.word_count_change() as f64);
        metrics.insert(
            "word_count_change_percent".to_string(),
            if words_before > 0.0 {
                self.details.word_count_change() as f64 / words_before * 100.0
            } else {
                0.0
            },
        );
        metrics.insert("lines_added".to_string(), self.details.lines_added as f64);
        metrics.insert("lines_removed".to_string(), self.details.lines_removed as f64);

        metrics
    }

    pub fn format_report(&self) -> String {
        let mut lines = vec!["# Improvement Report".to_string(), String::new()];

        lines.push(format!("Score Before: {}", self.eval_before.short_description()));
        if let (Some(after), Some(delta)) = (&self.eval_after, self.score_delta()) {
            lines.push(format!("Score After: {}", after.short_description()));
            lines.push(format!("Improvement: {:+} points", delta));
        }
        lines.push(String::new());

        lines.push("## Content Changes".to_string());
        lines.push(format!("- Original word count: {}", self.details.word_count_before));
        lines.push(format!("- Improved word count: {}", self.details.word_count_after));
        let change = self.details.word_count_change();
        if change > 0 {
            lines.push(format!("- Added {} words", change));
        } else if change < 0 {
            lines.push(format!("- Removed {} words", change.abs()));
        }
        lines.push(format!(
            "- Lines: +{} -{}",
            self.details.lines_added, self.details.lines_removed
        ));
        lines.push(String::new());

        if !self.details.addressed_recommendations.is_empty() {
            lines.push("## Focus Areas".to_string());
            for area in &self.details.addressed_recommendations {
                lines.push(format!("- {}", area));
            }
            lines.push(String::new());
        }

        if let Some(after) = &self.eval_after {
            let changed: Vec<String> = self
                .eval_before
                .category_scores
                .iter()
                .filter_map(|(category, before)| {
                    let after = after.category_scores.get(category)?;
                    let change = i64::from(after.score) - i64::from(before.score);
                    (change != 0).then(|| {
                        format!(
                            "- {}: {} → {} ({:+})",
                            display_name(category),
                            before.score,
                            after.score,
                            change
                        )
                    })
                })
                .collect();

            if !changed.is_empty() {
                lines.push("## Category Changes".to_string());
                lines.extend(changed);
                lines.push(String::new());
            }
        }

        lines.join("\n")
    }
}
