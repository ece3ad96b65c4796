//! Mistral LLM Provider
//!
//! Implementation of `LlmProvider` for the hosted Mistral chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use mindprompt_core::{
    error::{CoreError, Result},
    message::Message,
    provider::{Completion, CompletionContent, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Mistral provider configuration
#[derive(Clone, Debug)]
pub struct MistralConfig {
    /// API key, absent when the service runs without a model
    pub api_key: Option<String>,

    /// API base URL, without trailing slash
    pub base_url: String,

    /// Model used when the caller does not override it
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.mistral.ai/v1".into(),
            model: GenerationOptions::default().model,
            timeout_secs: 60,
        }
    }
}

impl MistralConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_key: non_empty("MISTRAL_API_KEY"),
            base_url: non_empty("MISTRAL_BASE_URL")
                .map_or(defaults.base_url, |url| url.trim_end_matches('/').to_string()),
            model: non_empty("MISTRAL_MODEL").unwrap_or(defaults.model),
            timeout_secs: non_empty("MISTRAL_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Generation options seeded with the configured model
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            ..GenerationOptions::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<CompletionContent>,
}

/// Mistral LLM provider
pub struct MistralProvider {
    client: reqwest::Client,
    config: MistralConfig,
}

impl MistralProvider {
    /// Create from configuration
    pub fn from_config(config: MistralConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }


    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::Auth("MISTRAL_API_KEY is not set".into()))
    }

    fn build_request<'a>(messages: &'a [Message], options: &'a GenerationOptions) -> ChatRequest<'a> {
        ChatRequest {
            model: &options.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
        }
    }

    fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(CoreError::EmptyCompletion)?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn map_status(status: StatusCode, body: &str) -> CoreError {
        let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoreError::Auth(detail),
            StatusCode::TOO_MANY_REQUESTS => CoreError::RateLimited(detail),
            s if s.is_server_error() => CoreError::ProviderUnavailable(detail),
            _ => CoreError::Provider(detail),
        }
    }

    fn map_transport(err: &reqwest::Error) -> CoreError {
        if err.is_connect() || err.is_timeout() {
            CoreError::ProviderUnavailable(err.to_string())
        } else {
            CoreError::Provider(err.to_string())
        }
    }
}

#[async_trait]
impl LlmProvider for MistralProvider {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn health_check(&self) -> Result<bool> {
        let Ok(key) = self.api_key() else {
            return Ok(false);
        };

        let url = format!("{}/models", self.config.base_url);
        match self.client.get(&url).bearer_auth(key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!(error = %e, "Mistral health check failed");
                Ok(false)
            }
        }
    }

    #[tracing::instrument(skip(self, messages, options), fields(model = %options.model))]
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let key = self.api_key()?;
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = Self::build_request(messages, options);

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Mistral request rejected");
            return Err(Self::map_status(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("Malformed response: {e}")))?;

        let completion = Self::convert_completion(body, &options.model)?;
        if let Some(usage) = &completion.usage {
            tracing::debug!(total_tokens = usage.total_tokens, "Mistral completion");
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = MistralConfig::from_lookup(lookup(&[]));
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, "https://api.mistral.ai/v1");
        assert_eq!(config.model, "mistral-large-latest");
    }

    #[test]
    fn test_config_overrides() {
        let config = MistralConfig::from_lookup(lookup(&[
            ("MISTRAL_API_KEY", "secret"),
            ("MISTRAL_BASE_URL", "http://localhost:9000/v1/"),
            ("MISTRAL_MODEL", "mistral-small-latest"),
            ("MISTRAL_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.generation_options().model, "mistral-small-latest");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config = MistralConfig::from_lookup(lookup(&[("MISTRAL_API_KEY", "  ")]));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_request_body() {
        let messages = [Message::system("be brief"), Message::user("Root")];
        let options = GenerationOptions::default();
        let body = serde_json::to_value(MistralProvider::build_request(&messages, &options)).unwrap();

        assert_eq!(body["model"], "mistral-large-latest");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Root");
    }

    #[test]
    fn test_convert_fragmented_response() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "model": "mistral-large-2411",
                "choices": [{
                    "message": {"role": "assistant", "content": [
                        {"type": "text", "text": "Hello "},
                        {"type": "text", "text": "world"}
                    ]},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
            }"#,
        )
        .unwrap();

        let completion = MistralProvider::convert_completion(response, "mistral-large-latest").unwrap();
        assert_eq!(completion.content.text(), "Hello world");
        assert_eq!(completion.model, "mistral-large-2411");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_no_choices_is_empty_completion() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = MistralProvider::convert_completion(response, "m").unwrap_err();
        assert!(matches!(err, CoreError::EmptyCompletion));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            MistralProvider::map_status(StatusCode::UNAUTHORIZED, ""),
            CoreError::Auth(_)
        ));
        assert!(matches!(
            MistralProvider::map_status(StatusCode::TOO_MANY_REQUESTS, ""),
            CoreError::RateLimited(_)
        ));
        assert!(matches!(
            MistralProvider::map_status(StatusCode::BAD_GATEWAY, ""),
            CoreError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            MistralProvider::map_status(StatusCode::BAD_REQUEST, "bad"),
            CoreError::Provider(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let provider = MistralProvider::from_config(MistralConfig::default()).unwrap();
        assert!(!provider.health_check().await.unwrap());

        let err = provider
            .complete(&[Message::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
    }
}
