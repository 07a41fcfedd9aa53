//! The build-repair control loop.
//!
//! Each attempt runs the build; on failure it extracts errors, asks the
//! model for a fix plan and applies it, then the next attempt rebuilds.
//! Every failure below the loop is logged where it happens and costs one
//! attempt. The attempt counter only ever increases, so the loop always
//! terminates after `max_attempts` builds.
//!
//! A fix is generated and applied on every failed attempt, the last one
//! included. Only repairs followed by a rebuild count as completed, so an
//! exhausted run has exactly one more build than completed repairs.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::build::BuildRunner;
use crate::config::RepairConfig;
use crate::extract::ErrorExtractor;
use crate::fix::{ApplyReport, FixApplicator, FixGenerator};
use crate::llm::LlmProvider;

/// Where an attempt got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPhase {
    Idle,
    Building,
    Analyzing,
    Generating,
    Applying,
    Success,
    Exhausted,
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairPhase::Idle => "idle",
            RepairPhase::Building => "building",
            RepairPhase::Analyzing => "analyzing",
            RepairPhase::Generating => "generating",
            RepairPhase::Applying => "applying",
            RepairPhase::Success => "success",
            RepairPhase::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Record of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReport {
    /// 1-based.
    pub number: u32,
    pub phase_reached: RepairPhase,
    pub errors_found: usize,
    pub warnings_found: usize,
    pub apply: Option<ApplyReport>,
    /// Why the attempt ended early, if it did.
    pub note: Option<String>,
}

impl AttemptReport {
    fn new(number: u32) -> Self {
        Self {
            number,
            phase_reached: RepairPhase::Idle,
            errors_found: 0,
            warnings_found: 0,
            apply: None,
            note: None,
        }
    }

    fn ended(mut self, phase: RepairPhase, note: impl Into<String>) -> Self {
        self.phase_reached = phase;
        self.note = Some(note.into());
        self
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub succeeded: bool,
    pub attempts: Vec<AttemptReport>,
    pub build_invocations: u32,
}

impl RepairOutcome {
    /// Attempts that went through apply and were followed by a rebuild.
    pub fn completed_repairs(&self) -> usize {
        let rebuilt = self.attempts.len().saturating_sub(1);
        self.attempts[..rebuilt]
            .iter()
            .filter(|a| a.phase_reached == RepairPhase::Applying)
            .count()
    }
}

/// Drives build, analyze, generate and apply until the build passes or the
/// attempt budget runs out.
pub struct RepairLoop {
    runner: Arc<dyn BuildRunner>,
    extractor: ErrorExtractor,
    generator: FixGenerator,
    applicator: FixApplicator,
    max_attempts: u32,
}

impl RepairLoop {
    pub fn new(
        runner: Arc<dyn BuildRunner>,
        extractor: ErrorExtractor,
        generator: FixGenerator,
        applicator: FixApplicator,
        max_attempts: u32,
    ) -> Self {
        Self {
            runner,
            extractor,
            generator,
            applicator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Wires every component from `config`.
    pub fn from_config(
        config: &RepairConfig,
        runner: Arc<dyn BuildRunner>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self::new(
            runner,
            ErrorExtractor::new(config.output_tail_chars),
            FixGenerator::new(provider, config),
            FixApplicator::from_config(config),
            config.max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub async fn run(&self) -> RepairOutcome {
        let mut attempts = Vec::new();
        let mut build_invocations = 0;

        for number in 1..=self.max_attempts {
            info!(attempt = number, max_attempts = self.max_attempts, "Starting attempt");

            let mut report = AttemptReport::new(number);
            report.phase_reached = RepairPhase::Building;

            let build = self.runner.run_build().await;
            build_invocations += 1;
            if build.succeeded {
                debug!(attempt = number, "Build passed, stopping");
                report.phase_reached = RepairPhase::Success;
                attempts.push(report);
                return RepairOutcome {
                    succeeded: true,
                    attempts,
                    build_invocations,
                };
            }
            // the runner has already logged the failure
            debug!(
                attempt = number,
                exit_code = ?build.exit_code,
                timed_out = build.timed_out,
                "Analyzing failed build"
            );

            report.phase_reached = RepairPhase::Analyzing;
            let context = self.extractor.extract(&build.output);
            report.errors_found = context.errors.len();
            report.warnings_found = context.warnings.len();
            if !context.has_errors() {
                warn!(attempt = number, "No recognizable errors in build output");
                attempts.push(report.ended(RepairPhase::Analyzing, "no errors extracted"));
                continue;
            }
            info!(
                attempt = number,
                errors = report.errors_found,
                warnings = report.warnings_found,
                "Extracted build errors"
            );

            report.phase_reached = RepairPhase::Generating;
            let Some(response) = self.generator.try_generate_fix(&context).await else {
                attempts.push(report.ended(RepairPhase::Generating, "fix generation failed"));
                continue;
            };

            report.phase_reached = RepairPhase::Applying;
            match self.applicator.apply_response(&response).await {
                Ok(apply) => report.apply = Some(apply),
                Err(e) => {
                    error!(attempt = number, error = %e, "Could not parse fix plan");
                    report.note = Some(format!("unparseable fix plan: {e}"));
                }
            }
            attempts.push(report);
        }

        error!(
            attempts = attempts.len(),
            builds = build_invocations,
            "Build still failing after all attempts"
        );
        if let Some(last) = attempts.last_mut() {
            last.phase_reached = RepairPhase::Exhausted;
        }

        RepairOutcome {
            succeeded: false,
            attempts,
            build_invocations,
        }
    }
}
