use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form metadata attached to documents and history entries
pub type Metadata = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_MAX_SCORE: u32 = 100;

/// Letter-style quality grade derived from the score percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Poor,
    #[serde(rename = "Needs Improvement", alias = "NeedsImprovement")]
    NeedsImprovement,
    Satisfactory,
    Good,
    Excellent,
    /// The evaluation itself failed; the score carries no signal
    Error,
}

impl Grade {
    /// Grade for a score using the fixed percentage thresholds
    pub fn from_score(total_score: u32, max_score: u32) -> Self {
        let percentage = percentage(total_score, max_score);
        if percentage >= 90.0 {
            Grade::Excellent
        } else if percentage >= 80.0 {
            Grade::Good
        } else if percentage >= 70.0 {
            Grade::Satisfactory
        } else if percentage >= 50.0 {
            Grade::NeedsImprovement
        } else {
            Grade::Poor
        }
    }

    /// Lenient parse of grade labels as emitted by scoring backends
    /// ("Needs Improvement", "needs_improvement", "EXCELLENT", ...)
    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "poor" => Some(Grade::Poor),
            "needsimprovement" => Some(Grade::NeedsImprovement),
            "satisfactory" => Some(Grade::Satisfactory),
            "good" => Some(Grade::Good),
            "excellent" => Some(Grade::Excellent),
            "error" => Some(Grade::Error),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Poor => "Poor",
            Grade::NeedsImprovement => "Needs Improvement",
            Grade::Satisfactory => "Satisfactory",
            Grade::Good => "Good",
            Grade::Excellent => "Excellent",
            Grade::Error => "Error",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Score for one evaluation category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: u32,
    pub max_score: u32,
    pub reason: String,
}

impl CategoryScore {
    pub fn percentage(&self) -> f64 {
        percentage(self.score, self.max_score)
    }
}

/// Canonical evaluation of a document.
///
/// Always produced through [`crate::ScoreCard::normalize`] (or
/// [`EvaluationResult::failed`]); downstream code never sees raw backend
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub total_score: u32,
    pub max_score: u32,
    pub grade: Grade,
    pub summary: String,
    #[serde(default)]
    pub category_scores: BTreeMap<String, CategoryScore>,
    #[serde(default)]
    pub top_recommendations: Vec<String>,
}

impl EvaluationResult {
    /// Degraded result standing in for an evaluation that could not be
    /// produced. Scores zero so it never wins best-content tracking.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            total_score: 0,
            max_score: DEFAULT_MAX_SCORE,
            grade: Grade::Error,
            summary: format!("Evaluation failed: {}", reason),
            category_scores: BTreeMap::new(),
            top_recommendations: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.grade == Grade::Error
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.total_score, self.max_score)
    }

    /// Flat numeric view of the evaluation: the total, its percentage, and
    /// every category's score and percentage.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("total_score".to_string(), f64::from(self.total_score));
        metrics.insert("score_percentage".to_string(), self.percentage());

        for (category, data) in &self.category_scores {
            metrics.insert(category.clone(), f64::from(data.score));
            metrics.insert(format!("{}_percentage", category), data.percentage());
        }

        metrics
    }

    /// One-line description for logs
    pub fn short_description(&self) -> String {
        format!("{}/{} ({})", self.total_score, self.max_score, self.grade)
    }
}

fn percentage(score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(max_score) * 100.0
}

/// `title_and_description` -> `Title And Description`
pub fn display_name(category: &str) -> String {
    category
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
