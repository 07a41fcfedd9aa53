//! LLM integration for buildfix.
//!
//! The repair loop talks to the model through the [`LlmProvider`] trait. The
//! shipped implementation, [`ChatCompletionClient`], speaks the
//! OpenAI-compatible `/chat/completions` protocol, which also covers
//! LiteLLM and OpenRouter gateways.
//!
//! ```ignore
//! use buildfix::llm::{ChatCompletionClient, GenerationRequest, LlmProvider, Message};
//!
//! let client = ChatCompletionClient::from_config(&config)?;
//! let request = GenerationRequest::new("gpt-4o-mini", vec![Message::user("Hello")])
//!     .with_temperature(0.1);
//! let response = client.generate(request).await?;
//! ```

pub mod client;

pub use client::{
    ChatCompletionClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    Usage,
};
