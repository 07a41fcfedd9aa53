//! Error types for buildfix operations.
//!
//! Defines error types for the subsystems that can fail in a way callers
//! need to inspect:
//! - Configuration loading and startup preconditions
//! - LLM API interactions
//! - Fix plan parsing and validation
//! - Fix application against the working tree

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`crate::config::RepairConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing API key: set OPENAI_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("Build entrypoint not found: {}", .0.display())]
    MissingBuildEntrypoint(PathBuf),

    #[error("Project root does not exist or is not a directory: {}", .0.display())]
    InvalidProjectRoot(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response contained no content")]
    EmptyResponse,
}

/// Errors that make a fix plan unusable as a whole.
#[derive(Debug, Error)]
pub enum FixPlanError {
    #[error("No JSON object found in response: {0}")]
    NoJson(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fix #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Fix #{index} has unknown action '{action}' (expected add, modify or delete)")]
    UnknownAction { index: usize, action: String },
}

/// Errors for a single file fix or command. These are recorded per item
/// and never abort a lenient batch.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Path escapes project root: {0}")]
    PathEscape(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("File does not exist: {0}")]
    NotFound(String),

    #[error("Command timed out after {seconds} seconds")]
    CommandTimeout { seconds: u64 },

    #[error("Command exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
