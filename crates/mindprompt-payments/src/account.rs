//! Account Documents
//!
//! One document per user holding the premium flag and the daily credit
//! counters. The store is a port: the ledger and the premium writer only see
//! the `AccountStore` trait, adapters live next to it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Per-user account document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub is_premium: bool,

    /// Credits consumed since `last_reset_date`, ignored for premium accounts
    #[serde(default)]
    pub credits_used_today: u32,

    /// Calendar day (`YYYY-MM-DD`) the counter belongs to
    #[serde(default)]
    pub last_reset_date: String,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Fresh non-premium account for the given day
    pub fn new(id: impl Into<String>, email: impl Into<String>, today: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            last_reset_date: today.into(),
            ..Default::default()
        }
    }
}

/// Partial update of an account document. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub is_premium: Option<bool>,
    pub credits_used_today: Option<u32>,
    pub last_reset_date: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AccountPatch {
    /// Reset or set the daily counter for a given day
    pub fn credits(used: u32, day: impl Into<String>) -> Self {
        Self {
            credits_used_today: Some(used),
            last_reset_date: Some(day.into()),
            ..Default::default()
        }
    }

    /// Increment-style counter write within the current day
    pub fn credits_used(used: u32) -> Self {
        Self {
            credits_used_today: Some(used),
            ..Default::default()
        }
    }

    pub fn premium(is_premium: bool, at: DateTime<Utc>) -> Self {
        Self {
            is_premium: Some(is_premium),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    /// Every field of an account, used to create a document
    pub fn full(account: &UserAccount) -> Self {
        Self {
            email: Some(account.email.clone()),
            is_premium: Some(account.is_premium),
            credits_used_today: Some(account.credits_used_today),
            last_reset_date: Some(account.last_reset_date.clone()),
            updated_at: account.updated_at,
            created_at: account.created_at,
        }
    }

    /// Apply the set fields onto an account
    pub fn apply(&self, account: &mut UserAccount) {
        if let Some(email) = &self.email {
            account.email.clone_from(email);
        }
        if let Some(is_premium) = self.is_premium {
            account.is_premium = is_premium;
        }
        if let Some(used) = self.credits_used_today {
            account.credits_used_today = used;
        }
        if let Some(day) = &self.last_reset_date {
            account.last_reset_date.clone_from(day);
        }
        if self.updated_at.is_some() {
            account.updated_at = self.updated_at;
        }
        if self.created_at.is_some() {
            account.created_at = self.created_at;
        }
    }

    /// Document field names touched by this patch
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.email.is_some() {
            paths.push("email");
        }
        if self.is_premium.is_some() {
            paths.push("isPremium");
        }
        if self.credits_used_today.is_some() {
            paths.push("creditsUsedToday");
        }
        if self.last_reset_date.is_some() {
            paths.push("lastResetDate");
        }
        if self.updated_at.is_some() {
            paths.push("updatedAt");
        }
        if self.created_at.is_some() {
            paths.push("createdAt");
        }
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.field_paths().is_empty()
    }
}

/// Account document store port
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Adapter name for logs and health output
    fn backend(&self) -> &'static str;

    /// Read an account document
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>>;

    /// Create the document unless one already exists
    ///
    /// Returns `false`, writing nothing, when the document is already there.
    async fn create(&self, account: &UserAccount) -> Result<bool>;

    /// Write the patch onto an existing document
    ///
    /// Fails with `AccountNotFound` when the document is absent.
    async fn update(&self, user_id: &str, patch: &AccountPatch) -> Result<()>;
}

/// In-memory account store (for development and tests)
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, UserAccount>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly
    pub async fn insert(&self, account: UserAccount) {
        self.accounts.write().await.insert(account.id.clone(), account);
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn create(&self, account: &UserAccount) -> Result<bool> {
        match self.accounts.write().await.entry(account.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn update(&self, user_id: &str, patch: &AccountPatch) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(user_id)
            .ok_or_else(|| PaymentError::AccountNotFound(user_id.to_string()))?;
        patch.apply(account);
        Ok(())
    }
}
