//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for chat-completion backends so the prompt
//! synthesizer works with any hosted model without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mindprompt_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = MistralProvider::from_config(MistralConfig::from_env())?;
//! let completion = provider.complete(&messages, &GenerationOptions::default()).await?;
//! println!("{}", completion.content.text());
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "mistral-large-latest")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    2000
}

const fn default_top_p() -> f32 {
    1.0
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "mistral-large-latest".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

/// One piece of a fragmented completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContentFragment {
    /// Fragment kind as reported by the provider ("text", "reference", ...)
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Text of the fragment, absent for non-text fragments
    #[serde(default)]
    pub text: Option<String>,
}

/// Completion content as returned by the provider.
///
/// Providers answer either with a flat string or with a list of typed
/// fragments; both shapes are accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionContent {
    Text(String),
    Fragments(Vec<ContentFragment>),
}

impl CompletionContent {
    /// Concatenate the text of the completion, fragments in order
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Fragments(fragments) => fragments
                .iter()
                .filter_map(|f| f.text.as_deref())
                .collect(),
        }
    }
}

impl Default for CompletionContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated content
    pub content: CompletionContent,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Error,
    #[serde(other)]
    Other,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The prompt synthesizer works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from messages
    async fn complete(&self, messages: &[Message], options: &GenerationOptions)
    -> Result<Completion>;
}
