//! JSON extraction for LLM responses.
//!
//! Models asked for "a single JSON object" still wrap it in markdown fences
//! or put a sentence in front of it. This module digs the object out before
//! it reaches `serde_json`.
//!
//! # Extraction Strategies
//!
//! Tried in order, each candidate validated with `serde_json`:
//! 1. The whole (trimmed) content
//! 2. A ```json fenced block
//! 3. Any fenced block containing an object
//! 4. The first balanced `{...}` in the content
//!
//! # Example
//!
//! ```
//! use buildfix::utils::json_extraction::try_extract_json_object;
//!
//! let response = "Here is the plan:\n```json\n{\"fixes\": []}\n```";
//! let json = try_extract_json_object(response).into_result().unwrap();
//! assert_eq!(json, "{\"fixes\": []}");
//! ```

use regex::Regex;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated ({unclosed_braces} unclosed braces); the response may have hit the token limit")]
    Truncated { unclosed_braces: usize },
    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// A JSON object that `serde_json` accepts.
    Success(String),
    /// An object was opened but never closed.
    Truncated { unclosed_braces: usize },
    /// Nothing object-like in the content.
    NotFound { content_preview: String },
}

impl JsonExtractionResult {
    /// Returns true if JSON was successfully extracted.
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    /// Converts the result to a Result with a descriptive error.
    pub fn into_result(self) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtractionResult::Success(json) => Ok(json),
            JsonExtractionResult::Truncated { unclosed_braces } => {
                Err(JsonExtractionError::Truncated { unclosed_braces })
            }
            JsonExtractionResult::NotFound { content_preview } => {
                Err(JsonExtractionError::NotFound { content_preview })
            }
        }
    }
}

fn is_json_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

/// Extracts the first JSON object from an LLM response.
pub fn try_extract_json_object(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    if is_json_object(trimmed) {
        return JsonExtractionResult::Success(trimmed.to_string());
    }

    for block in fenced_blocks(trimmed) {
        let block = block.trim();
        if let Some(start) = block.find('{') {
            if let Some(end) = find_matching_brace(&block[start..]) {
                let candidate = &block[start..=start + end];
                if is_json_object(candidate) {
                    return JsonExtractionResult::Success(candidate.to_string());
                }
            }
        }
    }

    // Scan every '{' so prose like "use {braces}" before the real object
    // does not hide it.
    let mut first_unclosed = None;
    for (start, _) in trimmed.match_indices('{') {
        match find_matching_brace(&trimmed[start..]) {
            Some(end) => {
                let candidate = &trimmed[start..=start + end];
                if is_json_object(candidate) {
                    return JsonExtractionResult::Success(candidate.to_string());
                }
            }
            None => {
                if first_unclosed.is_none() {
                    first_unclosed = Some(start);
                }
            }
        }
    }

    if let Some(start) = first_unclosed {
        return JsonExtractionResult::Truncated {
            unclosed_braces: count_unclosed_braces(&trimmed[start..]),
        };
    }

    JsonExtractionResult::NotFound {
        content_preview: trimmed.chars().take(80).collect(),
    }
}

/// Contents of fenced code blocks, ```json blocks first.
fn fenced_blocks(content: &str) -> Vec<&str> {
    let Ok(re) = Regex::new(r"```([A-Za-z0-9_-]*)[ \t]*\r?\n([\s\S]*?)```") else {
        return Vec::new();
    };

    let mut json_blocks = Vec::new();
    let mut other_blocks = Vec::new();
    for caps in re.captures_iter(content) {
        let Some(body) = caps.get(2) else { continue };
        let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if lang.eq_ignore_ascii_case("json") {
            json_blocks.push(body.as_str());
        } else {
            other_blocks.push(body.as_str());
        }
    }
    json_blocks.extend(other_blocks);
    json_blocks
}

/// Index of the `}` closing the object that starts at `s[0]`.
///
/// String literals and escape sequences are skipped, so braces inside file
/// contents do not count.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn count_unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let result = try_extract_json_object("  {\"analysis\": \"x\"}  ");
        assert_eq!(result, JsonExtractionResult::Success("{\"analysis\": \"x\"}".to_string()));
    }

    #[test]
    fn test_json_fence_preferred_over_other_fence() {
        let content = "```kotlin\nval x = {a: 1}\n```\n\n```json\n{\"fixes\": []}\n```";
        let result = try_extract_json_object(content);
        assert_eq!(result, JsonExtractionResult::Success("{\"fixes\": []}".to_string()));
    }

    #[test]
    fn test_object_after_prose() {
        let content = "Sure! Use {braces} carefully. {\"commands\": [\"echo }\"]} Done.";
        let result = try_extract_json_object(content);
        assert_eq!(
            result,
            JsonExtractionResult::Success("{\"commands\": [\"echo }\"]}".to_string())
        );
    }

    #[test]
    fn test_content_with_fence_inside_string() {
        let content = r#"{"fixes":[{"file":"README.md","action":"add","content":"```\ncode\n```"}]}"#;
        assert!(try_extract_json_object(content).is_success());
    }

    #[test]
    fn test_truncated_object() {
        let content = "{\"analysis\": \"x\", \"fixes\": [{\"file\": \"a\"";
        let result = try_extract_json_object(content);
        assert_eq!(result, JsonExtractionResult::Truncated { unclosed_braces: 2 });
        assert!(matches!(
            result.into_result(),
            Err(JsonExtractionError::Truncated { .. })
        ));
    }

    #[test]
    fn test_not_found() {
        let result = try_extract_json_object("I cannot help with that.");
        assert!(matches!(
            result,
            JsonExtractionResult::NotFound { ref content_preview } if content_preview == "I cannot help with that."
        ));
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(!try_extract_json_object("[1, 2, 3]").is_success());
    }

    #[test]
    fn test_find_matching_brace_skips_strings() {
        assert_eq!(find_matching_brace("{\"a\": \"}\"}"), Some(9));
        assert_eq!(find_matching_brace("{\"a\": {\"b\": 1}}"), Some(14));
        assert_eq!(find_matching_brace("{\"a\": \"\\\"}\""), None);
    }
}
