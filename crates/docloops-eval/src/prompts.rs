use crate::model::{display_name, EvaluationResult};
use crate::scorecard::ScoreCard;

/// Documents longer than this are truncated before being sent to a backend
pub const MAX_PROMPT_CONTENT_CHARS: usize = 60_000;

/// Prompt templates for the agent-backed evaluator and improver
pub struct EvaluationPrompts;

impl EvaluationPrompts {
    /// Build the scoring prompt for a document
    pub fn build_evaluation_prompt(content: &str, doc_type: &str, scorecard: &ScoreCard) -> String {
        let categories = match scorecard.categories() {
            Some(categories) => categories
                .iter()
                .map(|(name, weight)| format!("- `{}` ({}): max {} points", name, display_name(name), weight))
                .collect::<Vec<_>>()
                .join("\n"),
            None => "Choose 5-10 categories appropriate for this document. Category maxima must sum to 100.".to_string(),
        };

        format!(
            r#"You are an expert technical writer reviewing a {doc_type} document. Score it strictly against the rubric below.

## Document
```markdown
{content}
```

## Rubric
{categories}

## Grades
- Excellent: 90% or more
- Good: 80-89%
- Satisfactory: 70-79%
- Needs Improvement: 50-69%
- Poor: below 50%

---

## Output Format

Respond with a single JSON object wrapped in an evaluation block:

```
<evaluation>
{{
  "total_score": 0,
  "max_score": 100,
  "grade": "Needs Improvement",
  "summary": "One or two sentences on overall quality",
  "category_scores": {{
    "category_name": {{"score": 0, "max_score": 10, "reason": "Why this score"}}
  }},
  "top_recommendations": ["Most impactful change first"]
}}
</evaluation>
```

Use the exact category names from the rubric. Do not include anything else inside the block."#,
            doc_type = doc_type,
            content = truncate(content, MAX_PROMPT_CONTENT_CHARS),
            categories = categories,
        )
    }

    /// Build the rewrite prompt for a document
    pub fn build_improvement_prompt(
        content: &str,
        evaluation: &EvaluationResult,
        focus_areas: &[String],
    ) -> String {
        let focus = focus_areas
            .iter()
            .map(|area| format!("- {}", area))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an expert technical writer. Improve the document below based on the evaluation feedback.

## Current Document
```markdown
{content}
```

## Evaluation
{evaluation}

## Areas To Focus On
{focus}

## Instructions
1. Keep the intended audience and purpose in mind.
2. Maintain the existing structure unless reorganization clearly improves it.
3. Preserve existing links, code snippets and technical details.
4. Address the focus areas first.
5. Do not invent features or facts that are not in the original.
6. Use proper markdown formatting.

Respond with the complete improved document and nothing else."#,
            content = truncate(content, MAX_PROMPT_CONTENT_CHARS),
            evaluation = Self::format_evaluation(evaluation),
            focus = focus,
        )
    }

    /// Plain-text rendering of an evaluation for inclusion in prompts
    pub fn format_evaluation(evaluation: &EvaluationResult) -> String {
        let mut out = format!(
            "Score: {}\nSummary: {}\n",
            evaluation.short_description(),
            evaluation.summary
        );

        if !evaluation.category_scores.is_empty() {
            out.push_str("\nCategory scores:\n");
            for (name, data) in &evaluation.category_scores {
                out.push_str(&format!(
                    "- {}: {}/{} - {}\n",
                    display_name(name),
                    data.score,
                    data.max_score,
                    data.reason
                ));
            }
        }

        if !evaluation.top_recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for rec in &evaluation.top_recommendations {
                out.push_str(&format!("- {}\n", rec));
            }
        }

        out
    }
}

/// Truncate on a char boundary, marking the cut
fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n\n[... truncated ...]", &content[..idx]),
        None => content.to_string(),
    }
}
