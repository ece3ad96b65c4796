//! # mindprompt-runtime
//!
//! Hosted LLM providers for the mindprompt service.
//!
//! ## Providers
//!
//! - **Mistral** (default): chat completions via the Mistral API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mindprompt_runtime::{MistralConfig, MistralProvider};
//!
//! let config = MistralConfig::from_env();
//! let options = config.generation_options();
//! let provider = MistralProvider::from_config(config)?;
//! let synthesizer = PromptSynthesizer::new(Arc::new(provider), options);
//! ```

#[cfg(feature = "mistral")]
pub mod mistral;

#[cfg(feature = "mistral")]
pub use mistral::{MistralConfig, MistralProvider};

// Re-export core types for convenience
pub use mindprompt_core::{CoreError, LlmProvider, Message, Result, Role};
