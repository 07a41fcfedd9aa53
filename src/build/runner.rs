//! Build runner backed by a local process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{BuildResult, BuildRunner};
use crate::config::RepairConfig;

/// Runs a fixed build command in the project root with a hard timeout.
#[derive(Debug, Clone)]
pub struct CommandBuildRunner {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CommandBuildRunner {
    /// Creates a runner for `program args...` executed in `working_dir`.
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Creates a runner from the build settings of a [`RepairConfig`].
    pub fn from_config(config: &RepairConfig) -> Self {
        // Relative entrypoints like ./gradlew are resolved against the
        // project root, not the parent's working directory.
        let program = config
            .build_entrypoint()
            .unwrap_or_else(|| PathBuf::from(&config.build_program));
        Self::new(
            program,
            config.build_args.clone(),
            config.project_root.clone(),
            config.build_timeout(),
        )
    }

    /// Command line as it would appear in a shell, for logging.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[async_trait]
impl BuildRunner for CommandBuildRunner {
    async fn run_build(&self) -> BuildResult {
        let start = Instant::now();
        info!(command = %self.command_line(), "Starting build");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(error = %e, "Failed to launch build");
                return BuildResult::launch_failure(e.to_string(), start.elapsed());
            }
        };

        // Dropping the wait future on timeout drops the child, and
        // kill_on_drop reaps it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                let exit_code = output.status.code().unwrap_or(-1);
                let result = BuildResult::completed(exit_code, combined, start.elapsed());

                if result.succeeded {
                    info!(duration = ?result.duration, "Build succeeded");
                } else {
                    warn!(exit_code, duration = ?result.duration, "Build failed");
                }
                debug!(bytes = result.output.len(), "Captured build output");
                result
            }
            Ok(Err(e)) => {
                error!(error = %e, "Error while waiting for build");
                BuildResult::launch_failure(e.to_string(), start.elapsed())
            }
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "Build timed out");
                BuildResult::timeout(self.timeout)
            }
        }
    }
}
