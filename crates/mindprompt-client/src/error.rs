//! Client Error Types

use thiserror::Error;

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error body
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Editor operation rejected by the mind map
    #[error(transparent)]
    Editor(#[from] mindprompt_core::CoreError),

    #[error("No node selected")]
    NothingSelected,
}

impl ClientError {
    /// HTTP status of an API error
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Retrying cannot help: unknown account or not allowed
    pub const fn is_fatal(&self) -> bool {
        matches!(self.status(), Some(401 | 403 | 404))
    }
}
