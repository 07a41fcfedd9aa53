//! Fix generation: error context in, raw model text out.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};

use super::snapshot::ProjectSnapshot;
use crate::config::RepairConfig;
use crate::error::LlmError;
use crate::extract::ErrorContext;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts::build_fix_prompt;

/// Asks the model for a fix plan.
pub struct FixGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    project_root: PathBuf,
    build_command: String,
    scan_limit: usize,
    listing_limit: usize,
    sort_listing: bool,
}

impl FixGenerator {
    /// Creates a generator using the model and snapshot settings of `config`.
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RepairConfig) -> Self {
        let mut build_command = config.build_program.clone();
        for arg in &config.build_args {
            build_command.push(' ');
            build_command.push_str(arg);
        }

        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            project_root: config.project_root.clone(),
            build_command,
            scan_limit: config.scan_limit,
            listing_limit: config.listing_limit,
            sort_listing: config.sort_listing,
        }
    }

    /// Builds the request for one failed attempt.
    pub fn build_request(&self, error_context: &ErrorContext) -> GenerationRequest {
        let snapshot = ProjectSnapshot::scan(
            &self.project_root,
            self.scan_limit,
            self.listing_limit,
            self.sort_listing,
        );
        debug!(
            files = snapshot.files.len(),
            truncated = snapshot.truncated,
            "Collected project snapshot"
        );

        let prompt = build_fix_prompt(error_context, &snapshot.listing(), &self.build_command);
        GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
    }

    /// Sends one request and returns the raw response text.
    pub async fn generate_fix(&self, error_context: &ErrorContext) -> Result<String, LlmError> {
        let request = self.build_request(error_context);
        info!(
            model = %self.model,
            errors = error_context.errors.len(),
            "Requesting fix plan"
        );

        let response = self.provider.generate(request).await?;
        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    /// Like [`generate_fix`](Self::generate_fix), but logs the error and
    /// returns `None` so the caller can abandon the attempt.
    pub async fn try_generate_fix(&self, error_context: &ErrorContext) -> Option<String> {
        match self.generate_fix(error_context).await {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, "Fix generation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ErrorExtractor;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CannedProvider {
        reply: Option<String>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.seen.lock().expect("lock").push(request);
            match &self.reply {
                Some(text) => Ok(GenerationResponse {
                    id: "r1".to_string(),
                    model: "test".to_string(),
                    choices: vec![Choice {
                        index: 0,
                        message: Message::assistant(text.clone()),
                        finish_reason: Some("stop".to_string()),
                    }],
                    usage: Usage::default(),
                }),
                None => Err(LlmError::RequestFailed("connection refused".to_string())),
            }
        }
    }

    fn generator(
        reply: Option<&str>,
        root: &std::path::Path,
    ) -> (FixGenerator, Arc<CannedProvider>) {
        let provider = Arc::new(CannedProvider {
            reply: reply.map(str::to_string),
            seen: Mutex::new(Vec::new()),
        });
        let config = RepairConfig::new(root);
        (FixGenerator::new(provider.clone(), &config), provider)
    }

    #[tokio::test]
    async fn test_generate_fix_sends_prompt_with_sampling_params() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("Main.kt"), "fun main() {}").expect("write");
        let (generator, provider) = generator(Some("{\"fixes\": []}"), dir.path());
        let ctx = ErrorExtractor::default().extract("Main.kt:1: error: boom");

        let text = generator.generate_fix(&ctx).await.expect("reply");
        assert_eq!(text, "{\"fixes\": []}");

        let seen = provider.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(2000));
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[1].content.contains("Main.kt"));
        assert!(request.messages[1]
            .content
            .contains("./gradlew build --no-daemon --stacktrace"));
    }

    #[tokio::test]
    async fn test_try_generate_fix_swallows_errors() {
        let dir = TempDir::new().expect("tempdir");
        let (generator, _) = generator(None, dir.path());
        let ctx = ErrorExtractor::default().extract("error: boom");
        assert!(generator.try_generate_fix(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let dir = TempDir::new().expect("tempdir");
        let (generator, _) = generator(Some("   "), dir.path());
        let ctx = ErrorExtractor::default().extract("error: boom");
        assert!(matches!(
            generator.generate_fix(&ctx).await,
            Err(LlmError::EmptyResponse)
        ));
    }
}
