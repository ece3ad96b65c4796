//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment and account errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Billing provider API error
    #[error("Stripe error: {message}")]
    Stripe {
        message: String,
        /// Provider error code, when the provider supplied one
        code: Option<String>,
    },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Payment session carries no user id in either correlation field
    #[error("No user id on session {0}")]
    MissingCorrelation(String),

    /// Account document does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Payment session is not paid
    #[error("Payment not completed for session {session_id} (status: {status})")]
    NotPaid { session_id: String, status: String },

    /// Write was accepted but the re-read does not show it yet
    #[error("Premium status for {user_id} not visible (expected {expected}, read {actual})")]
    NotVisible {
        user_id: String,
        expected: bool,
        actual: bool,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document store error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Shorthand for a provider error without a code
    pub fn stripe(message: impl Into<String>) -> Self {
        Self::Stripe {
            message: message.into(),
            code: None,
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Stripe { .. } | Self::Storage(_) | Self::NotVisible { .. }
        )
    }

    /// Provider error code, if any
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::Stripe { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Stripe { .. } => "Payment processing failed. Please try again.",
            Self::WebhookSignature(_) => "Webhook signature verification failed.",
            Self::WebhookParse(_) | Self::MissingCorrelation(_) => "Malformed payment event.",
            Self::AccountNotFound(_) => "User account not found.",
            Self::NotPaid { .. } => "Payment has not been completed.",
            Self::NotVisible { .. } => "Premium status could not be confirmed yet. Please retry.",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(PaymentError::Storage("timeout".into()).is_retryable());
        assert!(
            PaymentError::NotVisible {
                user_id: "u1".into(),
                expected: true,
                actual: false,
            }
            .is_retryable()
        );
        assert!(!PaymentError::AccountNotFound("u1".into()).is_retryable());
        assert!(!PaymentError::Config("missing key".into()).is_retryable());
    }

    #[test]
    fn test_provider_code() {
        let err = PaymentError::Stripe {
            message: "No such checkout.session".into(),
            code: Some("resource_missing".into()),
        };
        assert_eq!(err.provider_code(), Some("resource_missing"));
        assert_eq!(PaymentError::stripe("boom").provider_code(), None);
    }
}
