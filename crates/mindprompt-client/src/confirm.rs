//! Return-Page Confirmation
//!
//! After checkout the billing provider redirects to
//! `/success?session_id=...`. The page asks the service to verify the session
//! in case the webhook has not landed yet, retrying transient failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use mindprompt_core::{Backoff, RetryPolicy};

use crate::api::{ApiClient, PaymentConfirmation};
use crate::error::{ClientError, Result};

/// 3 attempts, 2 s then 4 s apart
pub const RETURN_PAGE_RETRY: RetryPolicy =
    RetryPolicy::new(3, Backoff::Linear(Duration::from_secs(2)));

/// Query parameter the checkout success URL carries
pub const SESSION_ID_PARAM: &str = "session_id";

/// Anything that can ask the service to verify a session
#[async_trait]
pub trait PaymentVerification: Send + Sync {
    async fn verify_payment(&self, session_id: &str, user_id: &str)
    -> Result<PaymentConfirmation>;
}

#[async_trait]
impl PaymentVerification for ApiClient {
    async fn verify_payment(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<PaymentConfirmation> {
        Self::verify_payment(self, session_id, user_id).await
    }
}

/// Session id from the return URL, if the page was reached from checkout
pub fn session_id_from_return_url(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == SESSION_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub struct PaymentConfirmer {
    verifier: Arc<dyn PaymentVerification>,
    retry: RetryPolicy,
}

impl PaymentConfirmer {
    pub fn new(verifier: Arc<dyn PaymentVerification>) -> Self {
        Self {
            verifier,
            retry: RETURN_PAGE_RETRY,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Confirm the session. 401, 403 and 404 stop immediately.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, session_id: &str, user_id: &str) -> Result<PaymentConfirmation> {
        let confirmation = self
            .retry
            .run(
                |e: &ClientError| !e.is_fatal(),
                |_| self.verifier.verify_payment(session_id, user_id),
            )
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Payment confirmation failed"))?;

        tracing::info!(
            already_premium = confirmation.already_premium,
            "Premium confirmed"
        );
        Ok(confirmation)
    }
}
