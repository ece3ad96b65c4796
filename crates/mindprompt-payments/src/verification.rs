//! Payment Verification
//!
//! Pull-side reconciliation used by the checkout return page when the webhook
//! may not have landed yet. The session is re-read from Stripe, the premium
//! write is retried with linear backoff and the result is confirmed with
//! repeated reads before success is reported.

use std::sync::Arc;
use std::time::Duration;

use mindprompt_core::{Backoff, RetryPolicy};
use serde::Serialize;

use crate::account::{AccountStore, UserAccount};
use crate::checkout::BillingProvider;
use crate::error::PaymentError;
use crate::premium::PremiumWriter;

/// Attempts and backoff for the premium write
pub const WRITE_RETRY: RetryPolicy = RetryPolicy::new(3, Backoff::Linear(Duration::from_secs(1)));

/// Attempts and spacing of the confirming reads
pub const CONFIRM_RETRY: RetryPolicy =
    RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(500)));

/// Successful verification
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub session_id: String,
    pub user_id: String,
    /// The account was premium before this call; nothing was written
    pub already_premium: bool,
    pub account: UserAccount,
}

/// Failure classes, each with a fixed HTTP status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationErrorKind {
    InvalidRequest,
    SessionLookup,
    SessionMismatch,
    NotPaid,
    AccountNotFound,
    WriteFailed,
    NotConfirmed,
    Internal,
}

impl VerificationErrorKind {
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest | Self::SessionLookup | Self::NotPaid => 400,
            Self::SessionMismatch => 403,
            Self::AccountNotFound => 404,
            Self::WriteFailed | Self::NotConfirmed | Self::Internal => 500,
        }
    }
}

/// Structured verification failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationError {
    pub kind: VerificationErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl VerificationError {
    pub fn new(kind: VerificationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expected: None,
            actual: None,
            payment_status: None,
            provider_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Carry over the diagnostics a payment error knows about
    fn from_payment_error(kind: VerificationErrorKind, message: &str, err: &PaymentError) -> Self {
        let mut failure = Self::new(kind, message).with_details(err.to_string());
        failure.provider_code = err.provider_code().map(ToString::to_string);
        if let PaymentError::NotVisible {
            expected, actual, ..
        } = err
        {
            failure.expected = Some(*expected);
            failure.actual = Some(*actual);
        }
        failure
    }

    pub const fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for VerificationError {}

/// Verification workflow
pub struct PaymentVerifier {
    billing: Arc<dyn BillingProvider>,
    store: Arc<dyn AccountStore>,
    writer: Arc<PremiumWriter>,
    write_retry: RetryPolicy,
    confirm_retry: RetryPolicy,
}

impl PaymentVerifier {
    pub fn new(
        billing: Arc<dyn BillingProvider>,
        store: Arc<dyn AccountStore>,
        writer: Arc<PremiumWriter>,
    ) -> Self {
        Self {
            billing,
            store,
            writer,
            write_retry: WRITE_RETRY,
            confirm_retry: CONFIRM_RETRY,
        }
    }

    /// Override both retry policies
    #[must_use]
    pub fn with_retry(mut self, write: RetryPolicy, confirm: RetryPolicy) -> Self {
        self.write_retry = write;
        self.confirm_retry = confirm;
        self
    }

    /// Confirm a paid session and make the account premium
    #[tracing::instrument(skip(self))]
    pub async fn verify(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<VerifiedPayment, VerificationError> {
        if session_id.trim().is_empty() || user_id.trim().is_empty() {
            return Err(VerificationError::new(
                VerificationErrorKind::InvalidRequest,
                "Session ID and User ID required",
            ));
        }

        // Stripe is the source of truth; a failed lookup is not retried here
        let session = self.billing.retrieve_session(session_id).await.map_err(|e| {
            tracing::warn!(error = %e, "Session lookup failed");
            VerificationError::from_payment_error(
                VerificationErrorKind::SessionLookup,
                "Invalid session ID or Stripe error",
                &e,
            )
        })?;

        // Only the user the session was opened for may claim it
        if session.correlation_id() != Some(user_id) {
            tracing::warn!(
                correlation_id = ?session.correlation_id(),
                "Session belongs to a different user"
            );
            return Err(VerificationError::new(
                VerificationErrorKind::SessionMismatch,
                "Session was not created for this user",
            ));
        }

        if !session.payment_status.is_paid() {
            let mut failure = VerificationError::new(
                VerificationErrorKind::NotPaid,
                format!(
                    "Payment status is \"{}\", not \"paid\"",
                    session.payment_status
                ),
            );
            failure.payment_status = Some(session.payment_status.to_string());
            return Err(failure);
        }

        let account = self
            .store
            .get(user_id)
            .await
            .map_err(|e| {
                VerificationError::from_payment_error(
                    VerificationErrorKind::Internal,
                    "Failed to read user account",
                    &e,
                )
            })?
            .ok_or_else(|| {
                VerificationError::new(
                    VerificationErrorKind::AccountNotFound,
                    format!("User not found: {user_id}"),
                )
            })?;

        if account.is_premium {
            tracing::info!("Account already premium");
            return Ok(VerifiedPayment {
                session_id: session.id,
                user_id: user_id.to_string(),
                already_premium: true,
                account,
            });
        }

        self.write_retry
            .run(PaymentError::is_retryable, |_| {
                self.writer.set_premium(user_id, true)
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Premium write failed after retries");
                let kind = match e {
                    PaymentError::AccountNotFound(_) => VerificationErrorKind::AccountNotFound,
                    _ => VerificationErrorKind::WriteFailed,
                };
                VerificationError::from_payment_error(kind, "Failed to update database", &e)
            })?;

        let account = self.confirm_visible(user_id).await?;

        tracing::info!(session_id = %session.id, "Payment verified, premium granted");
        Ok(VerifiedPayment {
            session_id: session.id,
            user_id: user_id.to_string(),
            already_premium: false,
            account,
        })
    }

    /// Re-read until the premium flag is visible
    async fn confirm_visible(&self, user_id: &str) -> Result<UserAccount, VerificationError> {
        // Spaced like the retries: the first read also waits
        let first_delay = self.confirm_retry.backoff.delay(1);
        if !first_delay.is_zero() {
            tokio::time::sleep(first_delay).await;
        }

        self.confirm_retry
            .run(PaymentError::is_retryable, |_| async move {
                let account = self
                    .store
                    .get(user_id)
                    .await?
                    .ok_or_else(|| PaymentError::AccountNotFound(user_id.to_string()))?;
                if account.is_premium {
                    Ok(account)
                } else {
                    Err(PaymentError::NotVisible {
                        user_id: user_id.to_string(),
                        expected: true,
                        actual: account.is_premium,
                    })
                }
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Premium status not visible after write");
                let kind = match e {
                    PaymentError::NotVisible { .. } => VerificationErrorKind::NotConfirmed,
                    _ => VerificationErrorKind::Internal,
                };
                VerificationError::from_payment_error(
                    kind,
                    "Update succeeded but verification failed after retries",
                    &e,
                )
            })
    }
}
