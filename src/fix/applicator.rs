//! Applies a fix plan to the working tree.
//!
//! File fixes run first, in plan order, then shell commands. Under
//! [`ApplyPolicy::Lenient`] every item is attempted regardless of earlier
//! failures. Under [`ApplyPolicy::Strict`] the first failed or rejected item
//! stops the batch and the rest are recorded as skipped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use super::paths::resolve_project_path;
use super::plan::{FileFix, FixAction, FixPlan};
use crate::config::{ApplyPolicy, RepairConfig};
use crate::error::{ApplyError, FixPlanError};

/// Maximum stderr characters kept in a failed command's reason.
const STDERR_TAIL_CHARS: usize = 500;

/// What an outcome refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemTarget {
    File { path: String, action: String },
    Command { command: String },
}

/// How one item went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ItemStatus {
    Applied,
    Skipped(String),
    Failed(String),
    /// The path failed containment checks; nothing was touched.
    Rejected(String),
}

impl ItemStatus {
    fn stops_strict_batch(&self) -> bool {
        matches!(self, ItemStatus::Failed(_) | ItemStatus::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub target: ItemTarget,
    pub status: ItemStatus,
}

/// Per-item results of one applied plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    pub analysis: String,
    pub confidence: f64,
    pub items: Vec<ItemOutcome>,
    /// Set when a strict batch stopped early.
    pub aborted: bool,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Applied)
            .count()
    }

    /// Failed plus rejected items.
    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status.stops_strict_batch())
            .count()
    }

    /// True when nothing failed, was rejected, or was cut off.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.failed_count() == 0
    }
}

/// Executes fix plans under a project root.
#[derive(Debug, Clone)]
pub struct FixApplicator {
    project_root: PathBuf,
    policy: ApplyPolicy,
    allow_commands: bool,
    command_timeout: Duration,
}

impl FixApplicator {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            policy: ApplyPolicy::default(),
            allow_commands: true,
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &RepairConfig) -> Self {
        Self {
            project_root: config.project_root.clone(),
            policy: config.apply_policy,
            allow_commands: config.allow_commands,
            command_timeout: config.command_timeout(),
        }
    }

    pub fn with_policy(mut self, policy: ApplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_commands(mut self, allow: bool) -> Self {
        self.allow_commands = allow;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Parses a raw model response and applies it.
    ///
    /// `Err` only when the response is not a usable plan. Item failures are
    /// reported in the returned [`ApplyReport`].
    pub async fn apply_response(&self, response: &str) -> Result<ApplyReport, FixPlanError> {
        let plan = FixPlan::parse(response)?;
        Ok(self.apply_plan(&plan).await)
    }

    #[instrument(skip(self, plan), fields(fixes = plan.fixes.len(), commands = plan.commands.len()))]
    pub async fn apply_plan(&self, plan: &FixPlan) -> ApplyReport {
        if !plan.analysis.is_empty() {
            info!(analysis = %plan.analysis, confidence = plan.confidence, "Applying fix plan");
        }

        let mut items = Vec::with_capacity(plan.fixes.len() + plan.commands.len());
        let mut aborted = false;

        for fix in &plan.fixes {
            let target = ItemTarget::File {
                path: fix.file.clone(),
                action: fix.action.name().to_string(),
            };
            let status = if aborted {
                ItemStatus::Skipped("batch aborted".to_string())
            } else {
                self.apply_file_fix(fix)
            };
            aborted |= self.should_abort(&status);
            items.push(ItemOutcome { target, status });
        }

        for command in &plan.commands {
            let target = ItemTarget::Command {
                command: command.clone(),
            };
            let status = if aborted {
                ItemStatus::Skipped("batch aborted".to_string())
            } else if !self.allow_commands {
                info!(command = %command, "Command execution disabled, skipping");
                ItemStatus::Skipped("commands disabled".to_string())
            } else {
                match self.run_command(command).await {
                    Ok(()) => ItemStatus::Applied,
                    Err(e) => {
                        warn!(command = %command, error = %e, "Command failed");
                        ItemStatus::Failed(e.to_string())
                    }
                }
            };
            aborted |= self.should_abort(&status);
            items.push(ItemOutcome { target, status });
        }

        if aborted {
            warn!("Strict policy stopped the batch after a failure");
        }

        let report = ApplyReport {
            analysis: plan.analysis.clone(),
            confidence: plan.confidence,
            items,
            aborted,
        };
        info!(
            applied = report.applied_count(),
            failed = report.failed_count(),
            total = report.items.len(),
            "Fix plan processed"
        );
        report
    }

    fn should_abort(&self, status: &ItemStatus) -> bool {
        self.policy == ApplyPolicy::Strict && status.stops_strict_batch()
    }

    fn apply_file_fix(&self, fix: &FileFix) -> ItemStatus {
        let path = match resolve_project_path(&self.project_root, &fix.file) {
            Ok(path) => path,
            Err(e) => {
                warn!(file = %fix.file, error = %e, "Rejected fix path");
                return ItemStatus::Rejected(e.to_string());
            }
        };
        let rel = path.relative.display().to_string();

        match &fix.action {
            FixAction::Add { content } => match write_with_parents(&path.absolute, content) {
                Ok(()) => {
                    info!(file = %rel, "Added file");
                    ItemStatus::Applied
                }
                Err(e) => {
                    warn!(file = %rel, error = %e, "Failed to add file");
                    ItemStatus::Failed(e.to_string())
                }
            },
            FixAction::Modify { content } => {
                if !path.absolute.is_file() {
                    let e = ApplyError::NotFound(rel.clone());
                    warn!(file = %rel, "Cannot modify missing file, skipping");
                    return ItemStatus::Failed(e.to_string());
                }
                match std::fs::write(&path.absolute, content) {
                    Ok(()) => {
                        info!(file = %rel, "Modified file");
                        ItemStatus::Applied
                    }
                    Err(e) => {
                        warn!(file = %rel, error = %e, "Failed to modify file");
                        ItemStatus::Failed(e.to_string())
                    }
                }
            }
            FixAction::Delete => {
                if !path.absolute.is_file() {
                    warn!(file = %rel, "File to delete does not exist, skipping");
                    return ItemStatus::Skipped(ApplyError::NotFound(rel).to_string());
                }
                match std::fs::remove_file(&path.absolute) {
                    Ok(()) => {
                        info!(file = %rel, "Deleted file");
                        ItemStatus::Applied
                    }
                    Err(e) => {
                        warn!(file = %rel, error = %e, "Failed to delete file");
                        ItemStatus::Failed(e.to_string())
                    }
                }
            }
        }
    }

    async fn run_command(&self, command: &str) -> Result<(), ApplyError> {
        info!(command = %command, "Running command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await
        {
            Ok(result) => result?,
            Err(_) => {
                error!(command = %command, "Command timed out");
                return Err(ApplyError::CommandTimeout {
                    seconds: self.command_timeout.as_secs(),
                });
            }
        };

        if output.status.success() {
            debug!(
                command = %command,
                stdout = %String::from_utf8_lossy(&output.stdout),
                "Command succeeded"
            );
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ApplyError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: crate::extract::tail_chars(stderr.trim(), STDERR_TAIL_CHARS),
        })
    }
}

fn write_with_parents(path: &Path, content: &str) -> Result<(), ApplyError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
