//! Error extraction from raw build output.
//!
//! Scans build output line by line for error and warning markers, keeps a
//! small window of surrounding lines around each hit and bounds the raw
//! output to its tail so the downstream prompt stays small.
//!
//! Nothing here fails: output with no recognizable markers produces an
//! empty [`ErrorContext`], which the repair loop treats as "nothing
//! actionable".

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Case-insensitive markers that open a new error entry.
const ERROR_MARKERS: &[&str] = &["error:", "failed", "exception"];

/// Case-insensitive marker for a warning entry.
const WARNING_MARKER: &str = "warning:";

/// Lines kept on each side of an error line.
const ERROR_WINDOW: usize = 3;

/// Lines kept on each side of a warning line.
const WARNING_WINDOW: usize = 1;

/// Default number of trailing characters kept from the build output.
pub const DEFAULT_TAIL_CHARS: usize = 3000;

/// Location patterns, tried in order. Group 1 is the path.
fn default_location_patterns() -> Vec<&'static str> {
    vec![
        r"file://([^\s:]+\.(?:kts|kt|java|xml|gradle)):(\d+)",
        r"([a-zA-Z0-9_/.-]+\.(?:kts|kt|java|xml|gradle)):(\d+)",
        r"> ([a-zA-Z0-9_/.-]+\.(?:kts|kt|java|xml|gradle))",
        r"at ([a-zA-Z0-9_/.-]+\.(?:kts|kt|java|xml|gradle))",
    ]
}

/// One error found in the build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// The triggering line, trimmed.
    pub line: String,
    /// Up to three lines before and after the triggering line.
    pub context_lines: Vec<String>,
    /// Source path mentioned on the triggering line, if any.
    pub file_location: Option<String>,
}

/// One warning found in the build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEntry {
    /// The triggering line, trimmed.
    pub line: String,
    /// One line before and after the triggering line.
    pub context_lines: Vec<String>,
}

/// Windowed view of a failed build, embedded in the fix prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<WarningEntry>,
    /// The last `tail_chars` characters of the build output.
    pub truncated_output: String,
}

impl ErrorContext {
    /// Whether at least one error entry was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Distinct file locations across all error entries, in order of first
    /// appearance.
    pub fn locations(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for location in self.errors.iter().filter_map(|e| e.file_location.as_deref()) {
            if !seen.contains(&location) {
                seen.push(location);
            }
        }
        seen
    }
}

/// Scans build output for errors and warnings.
pub struct ErrorExtractor {
    tail_chars: usize,
    location_patterns: Vec<Regex>,
}

impl ErrorExtractor {
    /// Creates an extractor that keeps the last `tail_chars` characters of
    /// the output.
    pub fn new(tail_chars: usize) -> Self {
        let location_patterns = default_location_patterns()
            .into_iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    debug!(pattern, error = %e, "Skipping invalid location pattern");
                    None
                }
            })
            .collect();

        Self {
            tail_chars,
            location_patterns,
        }
    }

    /// Extracts errors, warnings and the bounded output tail.
    pub fn extract(&self, build_output: &str) -> ErrorContext {
        let lines: Vec<&str> = build_output.split('\n').collect();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut open: Option<ErrorEntry> = None;

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            let lowered = line.to_lowercase();

            if ERROR_MARKERS.iter().any(|m| lowered.contains(m)) {
                if let Some(previous) = open.take() {
                    errors.push(previous);
                }
                open = Some(ErrorEntry {
                    line: line.to_string(),
                    context_lines: window(&lines, i, ERROR_WINDOW),
                    file_location: self.extract_file_location(line),
                });
            } else if lowered.contains(WARNING_MARKER) {
                warnings.push(WarningEntry {
                    line: line.to_string(),
                    context_lines: window(&lines, i, WARNING_WINDOW),
                });
            }
        }

        if let Some(last) = open {
            errors.push(last);
        }

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "Extracted build diagnostics"
        );

        ErrorContext {
            errors,
            warnings,
            truncated_output: tail_chars(build_output, self.tail_chars),
        }
    }

    /// Returns the path captured by the first matching location pattern.
    pub fn extract_file_location(&self, line: &str) -> Option<String> {
        self.location_patterns
            .iter()
            .find_map(|re| re.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for ErrorExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_CHARS)
    }
}

/// Lines `[index - radius, index + radius]`, clipped to the input.
fn window(lines: &[&str], index: usize, radius: usize) -> Vec<String> {
    let start = index.saturating_sub(radius);
    let end = (index + radius + 1).min(lines.len());
    lines[start..end]
        .iter()
        .map(|l| l.trim_end().to_string())
        .collect()
}

/// The last `max_chars` characters of `text`, on a char boundary.
pub fn tail_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    text.chars().skip(total - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRADLE_FAILURE: &str = "\
> Task :app:compileDebugKotlin
w: /src/app/Old.kt: warning: 'foo' is deprecated
e: /src/app/src/main/java/com/example/MainActivity.kt:42:13 Unresolved reference: bar
app/src/main/java/com/example/MainActivity.kt:42: error: cannot find symbol
  symbol: variable bar

FAILURE: Build failed with an exception.

* What went wrong:
Execution failed for task ':app:compileDebugKotlin'.";

    #[test]
    fn test_extract_groups_errors_in_order() {
        let ctx = ErrorExtractor::default().extract(GRADLE_FAILURE);

        let lines: Vec<&str> = ctx.errors.iter().map(|e| e.line.as_str()).collect();
        assert_eq!(
            lines,
            vec![
                "app/src/main/java/com/example/MainActivity.kt:42: error: cannot find symbol",
                "FAILURE: Build failed with an exception.",
                "Execution failed for task ':app:compileDebugKotlin'.",
            ]
        );
        assert_eq!(
            ctx.errors[0].file_location.as_deref(),
            Some("app/src/main/java/com/example/MainActivity.kt")
        );
        assert!(ctx.errors[1].file_location.is_none());
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.has_errors());
    }

    #[test]
    fn test_error_window_is_clipped() {
        let output = "error: first\nline two\nline three";
        let ctx = ErrorExtractor::default().extract(output);
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(
            ctx.errors[0].context_lines,
            vec!["error: first", "line two", "line three"]
        );
    }

    #[test]
    fn test_error_window_is_symmetric() {
        let output = "a\nb\nc\nd\nerror: boom\ne\nf\ng\nh";
        let ctx = ErrorExtractor::default().extract(output);
        assert_eq!(
            ctx.errors[0].context_lines,
            vec!["b", "c", "d", "error: boom", "e", "f", "g"]
        );
    }

    #[test]
    fn test_warning_window_and_case_insensitivity() {
        let output = "before\nWARNING: unchecked cast\nafter\ntrailing";
        let ctx = ErrorExtractor::default().extract(output);
        assert!(ctx.errors.is_empty());
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(
            ctx.warnings[0].context_lines,
            vec!["before", "WARNING: unchecked cast", "after"]
        );
    }

    #[test]
    fn test_no_error_markers_yields_only_warnings() {
        let output = "BUILD SUCCESSFUL\nwarning: unused import\nnote: something\nwarning: shadowed name";
        let ctx = ErrorExtractor::default().extract(output);
        assert!(ctx.errors.is_empty());
        let warnings: Vec<&str> = ctx.warnings.iter().map(|w| w.line.as_str()).collect();
        assert_eq!(
            warnings,
            vec!["warning: unused import", "warning: shadowed name"]
        );
    }

    #[test]
    fn test_error_line_is_not_also_a_warning() {
        let ctx = ErrorExtractor::default().extract("warning: treated as error: yes");
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_truncated_output_is_exact_tail() {
        let output: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let ctx = ErrorExtractor::new(3000).extract(&output);
        assert_eq!(ctx.truncated_output.chars().count(), 3000);
        assert_eq!(ctx.truncated_output, &output[2000..]);
    }

    #[test]
    fn test_short_output_is_not_truncated() {
        let ctx = ErrorExtractor::new(3000).extract("error: tiny");
        assert_eq!(ctx.truncated_output, "error: tiny");
    }

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("日本語テキスト", 3), "キスト");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_file_location_patterns() {
        let extractor = ErrorExtractor::default();
        assert_eq!(
            extractor.extract_file_location("foo.kt:42: type mismatch"),
            Some("foo.kt".to_string())
        );
        assert_eq!(extractor.extract_file_location("error: cannot find symbol"), None);
        assert_eq!(
            extractor.extract_file_location("e: file:///home/ci/app/Foo.kt:12:5 Unresolved"),
            Some("/home/ci/app/Foo.kt".to_string())
        );
        assert_eq!(
            extractor.extract_file_location("Build file 'app/build.gradle.kts' line: 7"),
            None
        );
        assert_eq!(
            extractor.extract_file_location("> app/build.gradle failed"),
            Some("app/build.gradle".to_string())
        );
        assert_eq!(
            extractor.extract_file_location("exception at res/layout/main.xml"),
            Some("res/layout/main.xml".to_string())
        );
        assert_eq!(
            extractor.extract_file_location("app/build.gradle.kts:5: error"),
            Some("app/build.gradle.kts".to_string())
        );
    }

    #[test]
    fn test_locations_are_deduplicated() {
        let output = "A.kt:1: error: x\nA.kt:2: error: y\nB.java:3: error: z";
        let ctx = ErrorExtractor::default().extract(output);
        assert_eq!(ctx.locations(), vec!["A.kt", "B.java"]);
    }

    #[test]
    fn test_empty_output() {
        let ctx = ErrorExtractor::default().extract("");
        assert!(!ctx.has_errors());
        assert!(ctx.warnings.is_empty());
        assert_eq!(ctx.truncated_output, "");
    }
}
