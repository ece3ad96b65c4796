//! Firestore Account Store
//!
//! `AccountStore` adapter over the Firestore REST API. Each account is one
//! document in the `users` collection; partial writes use an update mask so
//! untouched fields are never overwritten, and every write carries an
//! existence precondition.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde_json::{Map, Value, json};

use crate::account::{AccountPatch, AccountStore, UserAccount};
use crate::error::{PaymentError, Result};

const PRODUCTION_HOST: &str = "https://firestore.googleapis.com";

/// Firestore connection settings
#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub collection: String,
    /// OAuth access token, required outside the emulator
    pub access_token: Option<String>,
    /// `host:port` of a local emulator
    pub emulator_host: Option<String>,
    pub timeout_secs: u64,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: "(default)".into(),
            collection: "users".into(),
            access_token: None,
            emulator_host: None,
            timeout_secs: 10,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = non_empty("FIRESTORE_PROJECT_ID")
            .ok_or_else(|| PaymentError::Config("FIRESTORE_PROJECT_ID not set".into()))?;

        let mut config = Self::new(project_id);
        if let Some(database) = non_empty("FIRESTORE_DATABASE") {
            config.database = database;
        }
        config.access_token = non_empty("FIRESTORE_ACCESS_TOKEN");
        config.emulator_host = non_empty("FIRESTORE_EMULATOR_HOST");

        if config.access_token.is_none() && config.emulator_host.is_none() {
            return Err(PaymentError::Config(
                "FIRESTORE_ACCESS_TOKEN or FIRESTORE_EMULATOR_HOST must be set".into(),
            ));
        }

        Ok(config)
    }

    fn host(&self) -> String {
        self.emulator_host
            .as_ref()
            .map_or_else(|| PRODUCTION_HOST.to_string(), |h| format!("http://{h}"))
    }

    /// Document URL with every path segment percent-encoded
    fn document_url(&self, user_id: &str) -> Result<Url> {
        let host = self.host();
        let mut url = Url::parse(&host)
            .map_err(|e| PaymentError::Config(format!("Invalid Firestore host '{host}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Config(format!("Invalid Firestore host '{host}'")))?
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
                self.collection.as_str(),
                user_id,
            ]);
        Ok(url)
    }

    fn bearer(&self) -> &str {
        // The emulator accepts this fixed token as an admin credential
        self.access_token.as_deref().unwrap_or("owner")
    }
}

/// Firestore-backed account store
pub struct FirestoreAccountStore {
    client: reqwest::Client,
    config: FirestoreConfig,
}

impl FirestoreAccountStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FirestoreConfig::from_env()?)
    }

    /// Masked write. `must_exist` selects the precondition: the document
    /// must exist (update) or must not exist yet (create). Returns whether
    /// the precondition held.
    async fn write(&self, user_id: &str, patch: &AccountPatch, must_exist: bool) -> Result<bool> {
        let mut query: Vec<(&str, &str)> = patch
            .field_paths()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push((
            "currentDocument.exists",
            if must_exist { "true" } else { "false" },
        ));

        let response = self
            .client
            .patch(self.config.document_url(user_id)?)
            .bearer_auth(self.config.bearer())
            .query(&query)
            .json(&json!({ "fields": encode_patch(patch) }))
            .send()
            .await
            .map_err(|e| PaymentError::Storage(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND if must_exist => {
                Err(PaymentError::AccountNotFound(user_id.to_string()))
            }
            // ALREADY_EXISTS
            StatusCode::CONFLICT if !must_exist => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(PaymentError::Storage(format!("Firestore write {status}: {body}")))
            }
        }
    }
}

#[async_trait]
impl AccountStore for FirestoreAccountStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let response = self
            .client
            .get(self.config.document_url(user_id)?)
            .bearer_auth(self.config.bearer())
            .send()
            .await
            .map_err(|e| PaymentError::Storage(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let document: Value = response
                    .json()
                    .await
                    .map_err(|e| PaymentError::Storage(format!("Malformed document: {e}")))?;
                Ok(Some(decode_document(user_id, &document)))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(PaymentError::Storage(format!("Firestore read {status}: {body}")))
            }
        }
    }

    async fn create(&self, account: &UserAccount) -> Result<bool> {
        self.write(&account.id, &AccountPatch::full(account), false).await
    }

    async fn update(&self, user_id: &str, patch: &AccountPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.write(user_id, patch, true).await.map(|_| ())
    }
}

fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({ "timestampValue": at.to_rfc3339() })
}

/// Encode the set fields of a patch as Firestore typed values
fn encode_patch(patch: &AccountPatch) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(email) = &patch.email {
        fields.insert("email".into(), json!({ "stringValue": email }));
    }
    if let Some(is_premium) = patch.is_premium {
        fields.insert("isPremium".into(), json!({ "booleanValue": is_premium }));
    }
    if let Some(used) = patch.credits_used_today {
        fields.insert(
            "creditsUsedToday".into(),
            json!({ "integerValue": used.to_string() }),
        );
    }
    if let Some(day) = &patch.last_reset_date {
        fields.insert("lastResetDate".into(), json!({ "stringValue": day }));
    }
    if let Some(at) = patch.updated_at {
        fields.insert("updatedAt".into(), timestamp_value(at));
    }
    if let Some(at) = patch.created_at {
        fields.insert("createdAt".into(), timestamp_value(at));
    }
    fields
}

fn field<'a>(document: &'a Value, name: &str) -> Option<&'a Value> {
    document.get("fields").and_then(|fields| fields.get(name))
}

fn string_field(document: &Value, name: &str) -> Option<String> {
    field(document, name)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn bool_field(document: &Value, name: &str) -> Option<bool> {
    field(document, name)
        .and_then(|v| v.get("booleanValue"))
        .and_then(Value::as_bool)
}

fn integer_field(document: &Value, name: &str) -> Option<u32> {
    // integerValue is a JSON string on the wire; doubles show up for
    // documents written by clients that store plain numbers
    let value = field(document, name)?;
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64().and_then(|n| u32::try_from(n).ok()),
        };
    }
    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .and_then(|n| format!("{n:.0}").parse().ok())
}

fn timestamp_field(document: &Value, name: &str) -> Option<DateTime<Utc>> {
    field(document, name)
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode a Firestore document into an account. Missing fields take their
/// defaults.
fn decode_document(user_id: &str, document: &Value) -> UserAccount {
    UserAccount {
        id: user_id.to_string(),
        email: string_field(document, "email").unwrap_or_default(),
        is_premium: bool_field(document, "isPremium").unwrap_or(false),
        credits_used_today: integer_field(document, "creditsUsedToday").unwrap_or(0),
        last_reset_date: string_field(document, "lastResetDate").unwrap_or_default(),
        updated_at: timestamp_field(document, "updatedAt"),
        created_at: timestamp_field(document, "createdAt"),
    }
}
