//! Server Configuration
//!
//! All settings come from environment variables. Parsing goes through a lookup
//! function so tests can supply their own variables.

use std::net::SocketAddr;

use mindprompt_payments::PREMIUM_PRICE_CENTS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Account store adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl StoreBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Firestore => "firestore",
        }
    }
}

/// Stripe credentials
#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl std::fmt::Debug for StripeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSettings").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Overrides host-header derivation of checkout redirect URLs
    pub public_base_url: Option<String>,
    pub store_backend: StoreBackend,
    /// `None` disables the payment endpoints
    pub stripe: Option<StripeSettings>,
    pub price_cents: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            public_base_url: None,
            store_backend: StoreBackend::Memory,
            stripe: None,
            price_cents: PREMIUM_PRICE_CENTS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_address = match var("BIND_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue("BIND_ADDR".into(), e.to_string()))?,
            None => defaults.bind_address,
        };

        let store_backend = match var("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("firestore") => StoreBackend::Firestore,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".into(),
                    format!("'{other}' is not one of memory, firestore"),
                ));
            }
            None if var("FIRESTORE_PROJECT_ID").is_some() => StoreBackend::Firestore,
            None => StoreBackend::Memory,
        };

        let stripe = match (var("STRIPE_SECRET_KEY"), var("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeSettings {
                secret_key,
                webhook_secret,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("STRIPE_WEBHOOK_SECRET".into())),
            (None, Some(_)) => return Err(ConfigError::MissingVar("STRIPE_SECRET_KEY".into())),
        };

        let price_cents = match var("CHECKOUT_PRICE_CENTS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|cents| *cents > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "CHECKOUT_PRICE_CENTS".into(),
                        format!("'{raw}' is not a positive amount of cents"),
                    )
                })?,
            None => defaults.price_cents,
        };

        Ok(Self {
            bind_address,
            public_base_url: var("PUBLIC_BASE_URL"),
            store_backend,
            stripe,
            price_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.stripe.is_none());
        assert!(config.public_base_url.is_none());
        assert_eq!(config.price_cents, 999);
    }

    #[test]
    fn test_firestore_inferred_from_project() {
        let config = parse(&[("FIRESTORE_PROJECT_ID", "demo")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Firestore);

        let config = parse(&[("FIRESTORE_PROJECT_ID", "demo"), ("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
    }

    #[test]
    fn test_stripe_needs_both_secrets() {
        let config = parse(&[
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
        ])
        .unwrap();
        assert!(config.stripe.is_some());

        let err = parse(&[("STRIPE_SECRET_KEY", "sk_test_1")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            parse(&[("STORE_BACKEND", "postgres")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            parse(&[("CHECKOUT_PRICE_CENTS", "-5")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let config = parse(&[
            ("STRIPE_SECRET_KEY", "sk_live_secret"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_secret"),
        ])
        .unwrap();
        assert!(!format!("{config:?}").contains("sk_live_secret"));
    }
}
