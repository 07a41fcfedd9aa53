//! Configuration for repair runs.
//!
//! A [`RepairConfig`] is built once at startup (defaults, then an optional
//! YAML file, then CLI flags) and handed to the repair loop. Nothing below
//! the CLI reads the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model used to propose fixes.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default build entrypoint, resolved against the project root.
pub const DEFAULT_BUILD_PROGRAM: &str = "./gradlew";

/// How the applicator reacts to a failing fix or command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyPolicy {
    /// Stop at the first failed or rejected item.
    Strict,
    /// Record the failure and keep going.
    #[default]
    Lenient,
}

/// Configuration for the build-repair loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Root of the project being built. All fix paths resolve under it.
    pub project_root: PathBuf,
    /// Build executable. Values containing a path separator are resolved
    /// against `project_root`.
    pub build_program: String,
    /// Arguments passed to the build executable.
    pub build_args: Vec<String>,
    /// Wall-clock limit for one build invocation, in seconds.
    pub build_timeout_secs: u64,
    /// Total number of build invocations allowed.
    pub max_attempts: u32,
    /// Base URL of the chat completions API.
    pub api_base: String,
    /// Credential for the chat completions API.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// HTTP timeout for one completion request, in seconds.
    pub request_timeout_secs: u64,
    /// Number of trailing characters of build output kept for the prompt.
    pub output_tail_chars: usize,
    /// Maximum number of files collected while scanning the project.
    pub scan_limit: usize,
    /// Maximum number of files listed in the prompt.
    pub listing_limit: usize,
    /// Sort the file listing before truncating it.
    pub sort_listing: bool,
    /// Failure policy for the applicator.
    pub apply_policy: ApplyPolicy,
    /// Whether shell commands proposed by the model are executed.
    pub allow_commands: bool,
    /// Wall-clock limit for one proposed shell command, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            build_program: DEFAULT_BUILD_PROGRAM.to_string(),
            build_args: vec![
                "build".to_string(),
                "--no-daemon".to_string(),
                "--stacktrace".to_string(),
            ],
            build_timeout_secs: 600,
            max_attempts: 3,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            request_timeout_secs: 120,
            output_tail_chars: 3000,
            scan_limit: 50,
            listing_limit: 30,
            sort_listing: true,
            apply_policy: ApplyPolicy::Lenient,
            allow_commands: true,
            command_timeout_secs: 300,
        }
    }
}

impl RepairConfig {
    /// Creates a configuration rooted at `project_root` with defaults.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Sets the build command.
    pub fn with_build_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.build_program = program.into();
        self.build_args = args;
        self
    }

    /// Sets the build timeout.
    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the applicator failure policy.
    pub fn with_apply_policy(mut self, policy: ApplyPolicy) -> Self {
        self.apply_policy = policy;
        self
    }

    /// Enables or disables execution of proposed shell commands.
    pub fn with_commands(mut self, allow: bool) -> Self {
        self.allow_commands = allow;
        self
    }

    /// Gets the build timeout.
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Gets the HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Gets the per-command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Path of the build entrypoint when `build_program` names a file
    /// rather than an executable looked up on `PATH`.
    pub fn build_entrypoint(&self) -> Option<PathBuf> {
        if self.build_program.contains('/') || self.build_program.contains('\\') {
            Some(self.project_root.join(&self.build_program))
        } else {
            None
        }
    }

    /// Checks the startup preconditions. Any error here is fatal before the
    /// first attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.project_root.is_dir() {
            return Err(ConfigError::InvalidProjectRoot(self.project_root.clone()));
        }
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingApiKey),
        }
        if let Some(entrypoint) = self.build_entrypoint() {
            if !entrypoint.exists() {
                return Err(ConfigError::MissingBuildEntrypoint(entrypoint));
            }
        }
        self.validate_limits()
    }

    /// Checks numeric fields only. Used by subcommands that need no
    /// credential.
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "build_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repair_config_defaults() {
        let config = RepairConfig::default();
        assert_eq!(config.build_program, "./gradlew");
        assert_eq!(
            config.build_args,
            vec!["build", "--no-daemon", "--stacktrace"]
        );
        assert_eq!(config.build_timeout(), Duration::from_secs(600));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.output_tail_chars, 3000);
        assert_eq!(config.scan_limit, 50);
        assert_eq!(config.listing_limit, 30);
        assert_eq!(config.apply_policy, ApplyPolicy::Lenient);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_from_yaml_partial_overrides() {
        let yaml = "max_attempts: 5\nmodel: gpt-4o\napply_policy: strict\nbuild_args: [assemble]\n";
        let config = RepairConfig::from_yaml_str(yaml).expect("yaml should parse");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.apply_policy, ApplyPolicy::Strict);
        assert_eq!(config.build_args, vec!["assemble"]);
        assert_eq!(config.build_timeout_secs, 600);
    }

    #[test]
    fn test_from_yaml_empty_is_default() {
        let config = RepairConfig::from_yaml_str("  \n").expect("empty yaml");
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = RepairConfig::default().with_api_key("sk-secret");
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        assert!(!yaml.contains("sk-secret"));
    }

    #[test]
    fn test_validate_missing_api_key() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("gradlew"), "#!/bin/sh\n").expect("write");
        let config = RepairConfig::new(dir.path());
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));

        let blank = RepairConfig::new(dir.path()).with_api_key("   ");
        assert!(matches!(blank.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_validate_missing_entrypoint() {
        let dir = TempDir::new().expect("tempdir");
        let config = RepairConfig::new(dir.path()).with_api_key("key");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingBuildEntrypoint(_))
        ));
    }

    #[test]
    fn test_validate_program_on_path_skips_entrypoint_check() {
        let dir = TempDir::new().expect("tempdir");
        let config = RepairConfig::new(dir.path())
            .with_api_key("key")
            .with_build_command("cargo", vec!["build".to_string()]);
        assert!(config.build_entrypoint().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("gradlew"), "").expect("write");
        let config = RepairConfig::new(dir.path())
            .with_api_key("key")
            .with_max_attempts(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
