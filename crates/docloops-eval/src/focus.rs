use crate::model::{display_name, EvaluationResult};

/// Categories at or above this percentage are considered good enough
pub const FOCUS_THRESHOLD_PERCENT: f64 = 80.0;

/// At most this many weak categories become focus areas
pub const MAX_CATEGORY_FOCUS: usize = 3;

/// Directives used when the evaluation offers no usable signal
pub const GENERIC_FOCUS_AREAS: [&str; 3] = [
    "Improve overall document structure and clarity",
    "Add more detail and usage examples where needed",
    "Ensure all information is accurate and complete",
];

/// Turns an evaluation into a ranked list of improvement directives.
///
/// Recommendations from the scoring backend are trusted over locally
/// recomputed category rankings, since the backend may weigh categories
/// non-linearly.
pub struct FocusAreaSelector;

impl FocusAreaSelector {
    pub fn select(evaluation: &EvaluationResult, explicit_categories: Option<&[String]>) -> Vec<String> {
        if let Some(categories) = explicit_categories.filter(|c| !c.is_empty()) {
            return categories
                .iter()
                .map(|category| format!("Improve {}", display_name(category)))
                .collect();
        }

        if !evaluation.top_recommendations.is_empty() {
            return evaluation.top_recommendations.clone();
        }

        let weakest = Self::weakest_categories(evaluation);
        if !weakest.is_empty() {
            return weakest;
        }

        GENERIC_FOCUS_AREAS.iter().map(|s| s.to_string()).collect()
    }

    fn weakest_categories(evaluation: &EvaluationResult) -> Vec<String> {
        let mut ranked: Vec<_> = evaluation
            .category_scores
            .iter()
            .filter(|(_, data)| data.max_score > 0)
            .map(|(category, data)| (category, data, data.percentage()))
            .collect();

        // Stable sort: ties keep category name order
        ranked.sort_by(|a, b| a.2.total_cmp(&b.2));

        ranked
            .into_iter()
            .take(MAX_CATEGORY_FOCUS)
            .filter(|(_, _, percentage)| *percentage < FOCUS_THRESHOLD_PERCENT)
            .map(|(category, data, _)| {
                format!(
                    "Improve {}: currently scores {}/{}",
                    display_name(category),
                    data.score,
                    data.max_score
                )
            })
            .collect()
    }
}
