//! # mindprompt-client
//!
//! Client side of the mindprompt service.
//!
//! - [`ApiClient`]: typed calls to the HTTP API
//! - [`EditorSession`]: the mind map being edited and the current selection
//! - [`PaymentConfirmer`]: the checkout return page's verification loop
//!
//! ```rust,ignore
//! let api = ApiClient::new("http://localhost:3000")?;
//! let mut editor = EditorSession::new();
//! editor.add_child()?;
//! let prompt = api
//!     .generate_prompt(user_id, editor.map(), PromptCategory::Code)
//!     .await?;
//! ```

mod api;
mod confirm;
mod editor;
mod error;

pub use api::{Account, ApiClient, CheckoutLink, Credits, GeneratedPrompt, PaymentConfirmation};
pub use confirm::{
    PaymentConfirmer, PaymentVerification, RETURN_PAGE_RETRY, SESSION_ID_PARAM,
    session_id_from_return_url,
};
pub use editor::{EditorSession, ROOT_POSITION, ROOT_TEXT};
pub use error::{ClientError, Result};

// Re-export core types for convenience
pub use mindprompt_core::{MindMap, MindMapNode, NodeStyle, PromptCategory};
