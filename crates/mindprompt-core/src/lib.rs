//! # mindprompt-core
//!
//! Mind-map model and provider-agnostic prompt synthesis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PromptSynthesizer                          │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  MindMap    │  │  PromptCategory  │  │  LlmProvider    │  │
//! │  │  (outline)  │──│  (instructions)  │──│  (Strategy)     │  │
//! │  └─────────────┘  └──────────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the synthesizer independent of the hosted
//! model. `retry` and `policy` hold the shared retry loop and the per-operation
//! failure policy used by the payment and credit code.

pub mod error;
pub mod message;
pub mod mindmap;
pub mod policy;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod synthesis;

pub use error::{CoreError, Result};
pub use message::{Message, Role};
pub use mindmap::{MindMap, MindMapNode, NodeStyle};
pub use policy::{FailurePolicy, Operation};
pub use prompt::PromptCategory;
pub use provider::LlmProvider;
pub use retry::{Backoff, RetryPolicy};
pub use synthesis::{PromptSynthesizer, Synthesis, SynthesisSource};
