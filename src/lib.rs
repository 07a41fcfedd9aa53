//! buildfix: an LLM-driven build repair loop.
//!
//! Runs a project's build, extracts errors from its output, asks an
//! OpenAI-compatible model for a JSON fix plan, applies the plan inside the
//! project root and rebuilds, up to a fixed number of attempts.

pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fix;
pub mod llm;
pub mod prompts;
pub mod repair;
pub mod utils;

pub use build::{BuildResult, BuildRunner, CommandBuildRunner};
pub use config::{ApplyPolicy, RepairConfig};
pub use error::{ApplyError, ConfigError, FixPlanError, LlmError};
pub use extract::{ErrorContext, ErrorExtractor};
pub use fix::{ApplyReport, FixApplicator, FixGenerator, FixPlan};
pub use repair::{AttemptReport, RepairLoop, RepairOutcome, RepairPhase};
