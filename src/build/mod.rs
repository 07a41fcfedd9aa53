//! Build invocation.
//!
//! The repair loop only sees the [`BuildRunner`] trait so that tests can
//! script build outcomes without spawning a real build tool.
//!
//! ```text
//! RepairLoop → BuildRunner::run_build → BuildResult { succeeded, output }
//! ```

pub mod runner;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use runner::CommandBuildRunner;

/// Outcome of one build invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    /// Whether the build exited with status 0.
    pub succeeded: bool,
    /// Combined stdout and stderr, or a synthetic message when the build
    /// could not run to completion.
    pub output: String,
    /// Exit code, when the process exited on its own.
    pub exit_code: Option<i32>,
    /// Whether the build was killed by the timeout.
    pub timed_out: bool,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
}

impl BuildResult {
    /// Creates a result for a build that exited normally.
    pub fn completed(exit_code: i32, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            succeeded: exit_code == 0,
            output: output.into(),
            exit_code: Some(exit_code),
            timed_out: false,
            duration,
        }
    }

    /// Creates a result for a build killed after `timeout`.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            succeeded: false,
            output: format!("Build timeout after {} seconds", timeout.as_secs()),
            exit_code: None,
            timed_out: true,
            duration: timeout,
        }
    }

    /// Creates a result for a build that could not be launched or awaited.
    pub fn launch_failure(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            succeeded: false,
            output: message.into(),
            exit_code: None,
            timed_out: false,
            duration,
        }
    }
}

/// Runs the project build.
///
/// Implementations never return an error: every failure mode is folded
/// into a [`BuildResult`] with `succeeded == false`.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Runs the build once and captures its result.
    async fn run_build(&self) -> BuildResult;
}
