//! Daily Credit Ledger
//!
//! Non-premium accounts get `DAILY_CREDIT_CAP` prompt generations per UTC
//! calendar day. The counter is reset lazily on the first ledger access of a
//! new day, so reads may write.
//!
//! Store errors never reach the caller: both entry points fail closed through
//! the operation policy table and answer "no credits".

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use mindprompt_core::Operation;
use serde::Serialize;

use crate::account::{AccountPatch, AccountStore, UserAccount};
use crate::error::{PaymentError, Result};

/// Free generations per calendar day
pub const DAILY_CREDIT_CAP: u32 = 3;

/// Remaining-credit value reported for premium accounts
pub const UNLIMITED_CREDITS: u32 = 999;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day used for the reset comparison
    fn today(&self) -> String {
        self.now().format("%Y-%m-%d").to_string()
    }
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and local tooling
#[derive(Debug)]
pub struct FixedClock {
    unix_seconds: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            unix_seconds: AtomicI64::new(at.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.unix_seconds.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.unix_seconds.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.unix_seconds.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}

/// Allowance snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    pub remaining: u32,
    pub is_premium: bool,
}

impl CreditStatus {
    /// Most restrictive answer
    pub const fn none() -> Self {
        Self {
            remaining: 0,
            is_premium: false,
        }
    }

    pub const fn unlimited() -> Self {
        Self {
            remaining: UNLIMITED_CREDITS,
            is_premium: true,
        }
    }

    pub const fn limited(used: u32) -> Self {
        Self {
            remaining: DAILY_CREDIT_CAP.saturating_sub(used),
            is_premium: false,
        }
    }
}

/// Credit accounting over the account store
pub struct CreditLedger {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn AccountStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create the account document on first sign-in. Existing documents are
    /// returned untouched, including one a concurrent sign-in just created.
    #[tracing::instrument(skip(self, email))]
    pub async fn ensure_account(&self, user_id: &str, email: &str) -> Result<UserAccount> {
        if let Some(existing) = self.store.get(user_id).await? {
            return Ok(existing);
        }

        let mut account = UserAccount::new(user_id, email, self.clock.today());
        account.created_at = Some(self.clock.now());
        if self.store.create(&account).await? {
            tracing::info!(user_id, "Created account");
            return Ok(account);
        }

        tracing::debug!(user_id, "Account created concurrently");
        self.store
            .get(user_id)
            .await?
            .ok_or_else(|| PaymentError::AccountNotFound(user_id.to_string()))
    }

    /// Remaining allowance, resetting the counter on a new day
    pub async fn check_and_reset_credits(&self, user_id: &str) -> CreditStatus {
        Operation::CheckCredits.recover(self.try_check(user_id).await, CreditStatus::none)
    }

    /// Spend one credit. Returns whether the generation is allowed.
    pub async fn consume_credit(&self, user_id: &str) -> bool {
        Operation::ConsumeCredit.recover(self.try_consume(user_id).await, || false)
    }

    async fn try_check(&self, user_id: &str) -> Result<CreditStatus> {
        let Some(account) = self.store.get(user_id).await? else {
            tracing::warn!(user_id, "Credit check for unknown account");
            return Ok(CreditStatus::none());
        };

        if account.is_premium {
            return Ok(CreditStatus::unlimited());
        }

        let today = self.clock.today();
        if account.last_reset_date != today {
            self.store
                .update(user_id, &AccountPatch::credits(0, today))
                .await?;
            tracing::debug!(user_id, "Daily credits reset");
            return Ok(CreditStatus::limited(0));
        }

        Ok(CreditStatus::limited(account.credits_used_today))
    }

    async fn try_consume(&self, user_id: &str) -> Result<bool> {
        let Some(account) = self.store.get(user_id).await? else {
            tracing::warn!(user_id, "Credit spend for unknown account");
            return Ok(false);
        };

        if account.is_premium {
            return Ok(true);
        }

        let today = self.clock.today();
        if account.last_reset_date != today {
            // The reset write also records this consumption
            self.store
                .update(user_id, &AccountPatch::credits(1, today))
                .await?;
            tracing::debug!(user_id, used = 1, "Credit consumed after daily reset");
            return Ok(true);
        }

        if account.credits_used_today >= DAILY_CREDIT_CAP {
            tracing::info!(user_id, "Daily credits exhausted");
            return Ok(false);
        }

        let used = account.credits_used_today + 1;
        self.store
            .update(user_id, &AccountPatch::credits_used(used))
            .await?;
        tracing::debug!(user_id, used, "Credit consumed");
        Ok(true)
    }
}
