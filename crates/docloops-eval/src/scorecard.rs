use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{CategoryScore, EvaluationResult, Grade, DEFAULT_MAX_SCORE};

/// Max score for a category that neither the schema nor the payload sizes
pub const DEFAULT_CATEGORY_MAX: u32 = 10;

const NO_SUMMARY: &str = "No summary provided";
const NO_REASON: &str = "No reason provided";

/// Category weights for README evaluation (sums to 100)
pub const README_CATEGORIES: &[(&str, u32)] = &[
    ("title_and_description", 10),
    ("structure_and_organization", 15),
    ("installation_guide", 15),
    ("usage_examples", 15),
    ("feature_explanation", 10),
    ("documentation_links", 10),
    ("badges_and_shields", 5),
    ("license_information", 5),
    ("contributing_guidelines", 5),
    ("conciseness_and_clarity", 10),
];

/// Category weights for wiki pages (sums to 100)
pub const WIKI_CATEGORIES: &[(&str, u32)] = &[
    ("content_quality", 15),
    ("structure_and_organization", 15),
    ("clarity_and_readability", 15),
    ("formatting_and_presentation", 10),
    ("cross_referencing", 15),
    ("completeness", 10),
    ("technical_depth", 10),
    ("user_focus", 10),
];

/// Category weights for any other markdown document (sums to 100)
pub const GENERIC_CATEGORIES: &[(&str, u32)] = &[
    ("content_quality", 20),
    ("structure_and_organization", 20),
    ("clarity_and_readability", 20),
    ("completeness", 15),
    ("technical_accuracy", 15),
    ("formatting_and_presentation", 10),
];

/// The single normalization boundary between raw evaluator payloads and
/// [`EvaluationResult`].
///
/// Accepted category encodings, found under `category_scores` or the legacy
/// `scores` wrapper:
///
/// ```text
/// {"usage_examples": {"score": 9, "max_score": 15, "reason": "..."}}
/// {"usage_examples": [9, "..."]}
/// ```
///
/// Entries in any other shape are skipped. Normalization is pure and
/// idempotent: feeding a serialized result back in yields the same result.
#[derive(Debug, Clone, Default)]
pub struct ScoreCard {
    schema: Option<BTreeMap<String, u32>>,
}

impl ScoreCard {
    /// A card that accepts any category name
    pub fn new() -> Self {
        Self { schema: None }
    }

    /// A card restricted to `categories`, whose weights become the
    /// categories' max scores
    pub fn with_categories<'a>(categories: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let schema = categories
            .into_iter()
            .filter(|(_, weight)| *weight > 0)
            .map(|(name, weight)| (name.to_string(), weight))
            .collect();
        Self {
            schema: Some(schema),
        }
    }

    pub fn readme() -> Self {
        Self::with_categories(README_CATEGORIES.iter().copied())
    }

    pub fn wiki() -> Self {
        Self::with_categories(WIKI_CATEGORIES.iter().copied())
    }

    pub fn generic() -> Self {
        Self::with_categories(GENERIC_CATEGORIES.iter().copied())
    }

    /// The built-in card for a document type
    pub fn for_doc_type(doc_type: &str) -> Self {
        match doc_type {
            "readme" => Self::readme(),
            "wiki" => Self::wiki(),
            _ => Self::generic(),
        }
    }

    /// Categories and weights this card expects, if restricted
    pub fn categories(&self) -> Option<&BTreeMap<String, u32>> {
        self.schema.as_ref()
    }

    pub fn normalize(&self, raw: &Value) -> EvaluationResult {
        let max_score = raw
            .get("max_score")
            .and_then(as_score)
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_SCORE);

        let category_scores = self.normalize_categories(raw);

        let total_score = match raw.get("total_score").and_then(as_score) {
            Some(total) => total.min(max_score),
            None => category_scores
                .values()
                .map(|c| c.score)
                .fold(0u32, u32::saturating_add)
                .min(max_score),
        };

        let grade = raw
            .get("grade")
            .and_then(Value::as_str)
            .and_then(Grade::parse)
            .unwrap_or_else(|| Grade::from_score(total_score, max_score));

        let summary = raw
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| NO_SUMMARY.to_string());

        let top_recommendations = raw
            .get("top_recommendations")
            .and_then(Value::as_array)
            .map(|recs| {
                recs.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|rec| !rec.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        EvaluationResult {
            total_score,
            max_score,
            grade,
            summary,
            category_scores,
            top_recommendations,
        }
    }

    fn normalize_categories(&self, raw: &Value) -> BTreeMap<String, CategoryScore> {
        let Some(entries) = category_entries(raw) else {
            return BTreeMap::new();
        };

        let mut categories = BTreeMap::new();
        for (category, value) in entries {
            match self.normalize_entry(category, value) {
                Some(score) => {
                    categories.insert(category.clone(), score);
                }
                None => debug!(category = %category, "Skipping malformed category score"),
            }
        }
        categories
    }

    fn normalize_entry(&self, category: &str, value: &Value) -> Option<CategoryScore> {
        let schema_max = match &self.schema {
            Some(schema) => Some(*schema.get(category)?),
            None => None,
        };

        let (score, entry_max, reason) = match value {
            Value::Object(map) => (
                map.get("score").and_then(as_score)?,
                map.get("max_score").and_then(as_score).filter(|m| *m > 0),
                map.get("reason").map(reason_text),
            ),
            Value::Array(items) if items.len() >= 2 => {
                (as_score(&items[0])?, None, Some(reason_text(&items[1])))
            }
            _ => return None,
        };

        let max_score = schema_max.or(entry_max).unwrap_or(DEFAULT_CATEGORY_MAX);

        Some(CategoryScore {
            score: score.min(max_score),
            max_score,
            reason: reason.unwrap_or_else(|| NO_REASON.to_string()),
        })
    }
}

fn category_entries(raw: &Value) -> Option<&Map<String, Value>> {
    raw.get("category_scores")
        .and_then(Value::as_object)
        .or_else(|| raw.get("scores").and_then(Value::as_object))
}

/// Non-negative integer score from a number or numeric string
fn as_score(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn reason_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NO_REASON.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renormalize(card: &ScoreCard, raw: &Value) -> (EvaluationResult, EvaluationResult) {
        let once = card.normalize(raw);
        let twice = card.normalize(&serde_json::to_value(&once).unwrap());
        (once, twice)
    }

    #[test]
    fn test_object_encoding() {
        let raw = json!({
            "category_scores": {
                "usage_examples": {"score": 9, "max_score": 15, "reason": "a few examples"},
                "license_information": {"score": 5, "max_score": 5, "reason": "MIT"}
            },
            "summary": "Decent",
            "top_recommendations": ["Add more examples"]
        });

        let result = ScoreCard::new().normalize(&raw);

        assert_eq!(result.total_score, 14);
        assert_eq!(result.max_score, 100);
        assert_eq!(result.grade, Grade::Poor);
        assert_eq!(result.summary, "Decent");
        assert_eq!(result.category_scores["usage_examples"].score, 9);
        assert_eq!(result.category_scores["usage_examples"].max_score, 15);
        assert_eq!(result.top_recommendations, vec!["Add more examples"]);
    }

    #[test]
    fn test_list_encoding_uses_schema_weights() {
        let raw = json!({
            "category_scores": {
                "usage_examples": [12, "good coverage"],
                "installation_guide": [15, "complete"]
            }
        });

        let result = ScoreCard::readme().normalize(&raw);

        assert_eq!(result.total_score, 27);
        assert_eq!(result.category_scores["usage_examples"].max_score, 15);
        assert_eq!(result.category_scores["usage_examples"].reason, "good coverage");
        assert!(result.top_recommendations.is_empty());
        assert_eq!(result.summary, NO_SUMMARY);
    }

    #[test]
    fn test_legacy_scores_wrapper() {
        let raw = json!({
            "scores": {
                "clarity": [7, "readable"],
                "depth": {"score": 3, "reason": "shallow"}
            }
        });

        let result = ScoreCard::new().normalize(&raw);

        assert_eq!(result.category_scores.len(), 2);
        assert_eq!(result.category_scores["clarity"].max_score, DEFAULT_CATEGORY_MAX);
        assert_eq!(result.category_scores["depth"].reason, "shallow");
        assert_eq!(result.total_score, 10);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let raw = json!({
            "category_scores": {
                "ok": {"score": 4, "max_score": 5},
                "no_score": {"reason": "missing"},
                "short_list": [3],
                "text": "great",
                "nan_score": {"score": "lots"}
            }
        });

        let result = ScoreCard::new().normalize(&raw);

        assert_eq!(result.category_scores.len(), 1);
        assert_eq!(result.category_scores["ok"].reason, NO_REASON);
        assert_eq!(result.total_score, 4);
    }

    #[test]
    fn test_schema_drops_unknown_categories() {
        let raw = json!({
            "category_scores": {
                "usage_examples": {"score": 10},
                "vibes": {"score": 10, "max_score": 10}
            }
        });

        let result = ScoreCard::readme().normalize(&raw);
        assert_eq!(result.category_scores.len(), 1);
        assert!(result.category_scores.contains_key("usage_examples"));
    }

    #[test]
    fn test_supplied_total_and_grade_win() {
        let raw = json!({
            "total_score": 72.6,
            "grade": "Good",
            "category_scores": {"a": {"score": 1, "max_score": 10}}
        });

        let result = ScoreCard::new().normalize(&raw);
        assert_eq!(result.total_score, 73);
        assert_eq!(result.grade, Grade::Good);
    }

    #[test]
    fn test_scores_are_clamped() {
        let raw = json!({
            "total_score": 140,
            "category_scores": {
                "a": {"score": 25, "max_score": 10},
                "b": {"score": -3, "max_score": 10}
            }
        });

        let result = ScoreCard::new().normalize(&raw);
        assert_eq!(result.total_score, 100);
        assert_eq!(result.category_scores["a"].score, 10);
        assert_eq!(result.category_scores["b"].score, 0);
    }

    #[test]
    fn test_summed_total_capped_at_max() {
        let raw = json!({
            "max_score": 20,
            "category_scores": {
                "a": {"score": 15, "max_score": 15},
                "b": {"score": 15, "max_score": 15}
            }
        });

        let result = ScoreCard::new().normalize(&raw);
        assert_eq!(result.total_score, 20);
        assert_eq!(result.grade, Grade::Excellent);
    }

    #[test]
    fn test_non_object_payload_degrades_to_empty() {
        let result = ScoreCard::new().normalize(&json!("not json object"));
        assert_eq!(result.total_score, 0);
        assert_eq!(result.grade, Grade::Poor);
        assert!(result.category_scores.is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let payloads = vec![
            json!({"category_scores": {"a": {"score": 8, "max_score": 10, "reason": "ok"}}}),
            json!({"category_scores": {"usage_examples": [11, {"detail": "nested"}]}}),
            json!({"scores": {"clarity": [7.4, "fine"], "depth": {"score": "3"}}}),
            json!({"total_score": 88, "grade": "needs_improvement", "top_recommendations": [" a ", "", 3]}),
            json!({"max_score": 0, "total_score": -5}),
            json!({"grade": "Error", "summary": "Evaluation failed: timeout"}),
            json!(null),
        ];

        for card in [ScoreCard::new(), ScoreCard::readme()] {
            for raw in &payloads {
                let (once, twice) = renormalize(&card, raw);
                assert_eq!(once, twice, "not idempotent for {}", raw);
            }
        }
    }

    #[test]
    fn test_card_for_doc_type() {
        let weights = ScoreCard::for_doc_type("readme");
        let total: u32 = weights.categories().unwrap().values().sum();
        assert_eq!(total, 100);

        let total: u32 = ScoreCard::for_doc_type("wiki").categories().unwrap().values().sum();
        assert_eq!(total, 100);

        let total: u32 = ScoreCard::for_doc_type("notes").categories().unwrap().values().sum();
        assert_eq!(total, 100);
    }
}
