use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ResponseParseError {
    #[error("No JSON object found in backend output")]
    NoJsonFound,

    #[error("Failed to parse evaluation JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Evaluation JSON must be an object")]
    NotAnObject,
}

/// Pull the evaluation JSON object out of free-form backend output.
///
/// Looks, in order, for an `<evaluation>...</evaluation>` block, a fenced
/// ```` ```json ```` block, and finally the first balanced `{...}` span.
pub fn extract_json(output: &str) -> Result<Value, ResponseParseError> {
    debug!(output_len = output.len(), "Extracting evaluation JSON");

    let candidate = tagged_block(output, "<evaluation>", "</evaluation>")
        .or_else(|| fenced_block(output, "```json"))
        .or_else(|| first_balanced_object(output))
        .ok_or(ResponseParseError::NoJsonFound)?;

    let value: Value = serde_json::from_str(candidate.trim())?;
    if !value.is_object() {
        return Err(ResponseParseError::NotAnObject);
    }
    Ok(value)
}

/// Strip wrapping code fences and surrounding whitespace from a rewritten
/// document. Inner fences (code samples in the document) are preserved.
pub fn clean_rewrite(output: &str) -> String {
    let trimmed = output.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };

    // Only a bare or markdown fence wraps the whole document. Anything else
    // is a code sample that happens to open the text.
    match body.split_once('\n') {
        Some((info, content)) if is_document_fence(info) => content.trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn is_document_fence(info: &str) -> bool {
    let info = info.trim();
    info.is_empty() || info.eq_ignore_ascii_case("markdown") || info.eq_ignore_ascii_case("md")
}

fn tagged_block<'a>(output: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = output.find(open)? + open.len();
    let end = output[start..].find(close)? + start;
    Some(&output[start..end])
}

fn fenced_block<'a>(output: &'a str, fence: &str) -> Option<&'a str> {
    let start = output.find(fence)? + fence.len();
    let end = output[start..].find("```")? + start;
    Some(&output[start..end])
}

fn first_balanced_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in output[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&output[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tagged_block() {
        let output = r#"Thinking...
<evaluation>
{"total_score": 72, "summary": "ok"}
</evaluation>
trailing {"noise": true}"#;
        let value = extract_json(output).unwrap();
        assert_eq!(value["total_score"], 72);
    }

    #[test]
    fn test_extract_fenced_block() {
        let output = "Here you go:\n```json\n{\"total_score\": 40}\n```\n";
        assert_eq!(extract_json(output).unwrap()["total_score"], 40);
    }

    #[test]
    fn test_extract_bare_object_with_braces_in_strings() {
        let output = r#"Result: {"summary": "uses {placeholders} and \"quotes\"", "total_score": 5} done"#;
        let value = extract_json(output).unwrap();
        assert_eq!(value["total_score"], 5);
        assert_eq!(value["summary"], "uses {placeholders} and \"quotes\"");
    }

    #[test]
    fn test_extract_errors() {
        assert!(matches!(
            extract_json("no json here"),
            Err(ResponseParseError::NoJsonFound)
        ));
        assert!(matches!(
            extract_json("<evaluation>{not json}</evaluation>"),
            Err(ResponseParseError::JsonParseError(_))
        ));
        assert!(matches!(
            extract_json("<evaluation>[1, 2]</evaluation>"),
            Err(ResponseParseError::NotAnObject)
        ));
    }

    #[test]
    fn test_clean_rewrite() {
        assert_eq!(clean_rewrite("  # Title\n\nBody\n"), "# Title\n\nBody");
        assert_eq!(
            clean_rewrite("```markdown\n# Title\n\n```sh\nmake\n```\n```"),
            "# Title\n\n```sh\nmake\n```"
        );
        assert_eq!(clean_rewrite("```\n# Title\n```"), "# Title");
        assert_eq!(clean_rewrite("   \n"), "");
    }

    #[test]
    fn test_clean_rewrite_keeps_leading_and_trailing_code_samples() {
        let document = "```sh\nmake install\n```\n\nUsage text\n\n```rust\nfn main() {}\n```";
        assert_eq!(clean_rewrite(document), document);
        assert_eq!(clean_rewrite("```MD\n# Title\n```"), "# Title");
    }
}
