//! Prompt Synthesis
//!
//! Turns a mind map into a natural-language prompt through an LLM provider.
//! Synthesis never fails: when the provider errors or answers with nothing,
//! a templated prompt built from the outline is returned instead.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::mindmap::MindMap;
use crate::policy::Operation;
use crate::prompt::{PromptCategory, fallback_prompt, user_message};
use crate::provider::{GenerationOptions, LlmProvider};

/// Where the returned text came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisSource {
    Model,
    Fallback,
}

/// Result of a synthesis
#[derive(Clone, Debug, Serialize)]
pub struct Synthesis {
    pub text: String,
    pub category: PromptCategory,
    pub source: SynthesisSource,
}

/// Prompt synthesis adapter
pub struct PromptSynthesizer {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl PromptSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }

    /// Create with default generation options
    pub fn with_defaults(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, GenerationOptions::default())
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Synthesize a prompt for the given mind map
    pub async fn synthesize(&self, map: &MindMap, category: PromptCategory) -> Synthesis {
        self.synthesize_outline(&map.outline(), category).await
    }

    /// Synthesize a prompt from an already rendered outline
    #[tracing::instrument(skip(self, outline), fields(provider = self.provider.name()))]
    pub async fn synthesize_outline(&self, outline: &str, category: PromptCategory) -> Synthesis {
        let generated = self.call_model(outline, category).await.map(|text| Synthesis {
            text,
            category,
            source: SynthesisSource::Model,
        });

        Operation::GeneratePrompt.recover(generated, || Synthesis {
            text: fallback_prompt(outline, category),
            category,
            source: SynthesisSource::Fallback,
        })
    }

    async fn call_model(&self, outline: &str, category: PromptCategory) -> Result<String> {
        let messages = [
            Message::system(category.system_instruction()),
            Message::user(user_message(outline)),
        ];

        let completion = self.provider.complete(&messages, &self.options).await?;
        let text = completion.content.text().trim().to_string();

        if text.is_empty() {
            return Err(CoreError::EmptyCompletion);
        }

        tracing::debug!(chars = text.len(), model = %completion.model, "Model produced prompt");
        Ok(text)
    }
}
