//! Premium-Status Writer
//!
//! Writes `isPremium` and checks it back. The store gives no read-your-write
//! guarantee, so a write whose re-read disagrees is reported as
//! `NotVisible`, which callers treat as retryable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::account::{AccountPatch, AccountStore, UserAccount};
use crate::error::{PaymentError, Result};

/// Pause between the write and the confirming read
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

pub struct PremiumWriter {
    store: Arc<dyn AccountStore>,
    settle_delay: Duration,
}

impl PremiumWriter {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Set the premium flag and confirm it with a re-read
    #[tracing::instrument(skip(self))]
    pub async fn set_premium(&self, user_id: &str, target: bool) -> Result<UserAccount> {
        if self.store.get(user_id).await?.is_none() {
            return Err(PaymentError::AccountNotFound(user_id.to_string()));
        }

        self.store
            .update(user_id, &AccountPatch::premium(target, Utc::now()))
            .await?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let account = self
            .store
            .get(user_id)
            .await?
            .ok_or_else(|| PaymentError::AccountNotFound(user_id.to_string()))?;

        if account.is_premium != target {
            tracing::warn!(user_id, target, "Premium write not visible on re-read");
            return Err(PaymentError::NotVisible {
                user_id: user_id.to_string(),
                expected: target,
                actual: account.is_premium,
            });
        }

        tracing::info!(user_id, is_premium = target, "Premium status written");
        Ok(account)
    }
}
