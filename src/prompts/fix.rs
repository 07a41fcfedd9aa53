//! Prompt construction for fix-plan generation.
//!
//! The model is asked for a single JSON object whose shape matches
//! [`crate::fix::plan::FixPlan`]. Anything else it sends back is handled by
//! the applicator's parser, not here.

use crate::extract::ErrorContext;

/// Prompts for one fix request.
#[derive(Debug, Clone)]
pub struct FixPrompt {
    /// System prompt framing the assistant's role.
    pub system: String,
    /// User prompt with the error context and project listing.
    pub user: String,
}

impl FixPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// System prompt for the fix request.
pub const FIX_SYSTEM_PROMPT: &str = "You are an expert build engineer who diagnoses and repairs \
failing builds. You answer with a single JSON object and nothing else.";

const FIX_USER_TEMPLATE: &str = r#"A project build failed and must be repaired.

## Build
Command: {build_command}

## Project files (paths relative to the project root)
{project_files}

## Build errors
{error_context}

## Instructions
1. Analyze the root cause of the errors.
2. Propose the smallest set of file changes that makes the build pass.
3. For "add" and "modify", give the COMPLETE new file content, not a diff.
4. Only use paths relative to the project root. Never use absolute paths or "..".
5. Only list shell commands that are strictly necessary; they run in the project root.

## Response format
Reply with exactly one JSON object:
{
  "analysis": "root cause analysis",
  "fixes": [
    {
      "file": "relative/path/to/file",
      "action": "add|modify|delete",
      "content": "complete file content (omit for delete)",
      "description": "what this change does"
    }
  ],
  "commands": ["shell command to run"],
  "confidence": 0.8
}
"#;

/// Builds the fix prompt for one failed attempt.
///
/// `project_files` is the newline-separated listing produced by the project
/// snapshot. The error context is embedded as pretty-printed JSON.
pub fn build_fix_prompt(
    error_context: &ErrorContext,
    project_files: &str,
    build_command: &str,
) -> FixPrompt {
    let context_json = serde_json::to_string_pretty(error_context)
        .unwrap_or_else(|_| error_context.truncated_output.clone());

    let listing = if project_files.trim().is_empty() {
        "(no project files found)"
    } else {
        project_files
    };

    let user = FIX_USER_TEMPLATE
        .replace("{build_command}", build_command)
        .replace("{project_files}", listing)
        .replace("{error_context}", &context_json);

    FixPrompt::new(FIX_SYSTEM_PROMPT, user)
}
