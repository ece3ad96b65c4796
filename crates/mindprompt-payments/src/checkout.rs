//! Stripe Checkout Integration
//!
//! Hosted one-time checkout for the premium upgrade, plus the session lookups
//! the webhook and verification paths use to read payment state back from
//! Stripe. The billing provider is always the source of truth; sessions are
//! never stored locally.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionPaymentStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency, CustomerId, ListCheckoutSessions,
    StripeError,
};

use crate::error::{PaymentError, Result};

/// Price of the premium upgrade in cents
pub const PREMIUM_PRICE_CENTS: i64 = 999;

/// Metadata key carrying the redundant copy of the user id
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Base URL used when neither configuration nor the request names one
pub const FALLBACK_BASE_URL: &str = "http://localhost:3000";

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// User upgrading, embedded as the correlation id
    pub user_id: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,

    pub price_cents: i64,
}

impl CheckoutRequest {
    /// Request for a user with redirect URLs derived from a base URL
    pub fn for_user(user_id: impl Into<String>, base_url: &str, price_cents: i64) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            user_id: user_id.into(),
            success_url: format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/canceled"),
            price_cents,
        }
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub url: String,
}

/// Payment state of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
            Self::Unknown => "unknown",
        }
    }

    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side view of a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub client_reference_id: Option<String>,
    pub metadata_user_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub customer: Option<String>,
}

impl PaymentSession {
    /// User id from the primary field, falling back to metadata
    pub fn correlation_id(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.metadata_user_id.as_deref().filter(|id| !id.is_empty()))
    }
}

/// Billing provider port
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Fetch a session by id
    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession>;

    /// Most recent checkout session of a customer
    async fn latest_session_for_customer(&self, customer_id: &str) -> Result<Option<PaymentSession>>;
}

impl From<StripeCheckoutSession> for PaymentSession {
    fn from(session: StripeCheckoutSession) -> Self {
        let payment_status = match session.payment_status {
            CheckoutSessionPaymentStatus::Paid => PaymentStatus::Paid,
            CheckoutSessionPaymentStatus::Unpaid => PaymentStatus::Unpaid,
            CheckoutSessionPaymentStatus::NoPaymentRequired => PaymentStatus::NoPaymentRequired,
        };

        Self {
            id: session.id.to_string(),
            client_reference_id: session.client_reference_id,
            metadata_user_id: session
                .metadata
                .as_ref()
                .and_then(|m| m.get(USER_ID_METADATA_KEY))
                .cloned(),
            payment_status,
            customer: session.customer.as_ref().map(|c| c.id().to_string()),
        }
    }
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

/// Map a Stripe error, keeping the provider's code
fn map_stripe_error(error: StripeError) -> PaymentError {
    match error {
        StripeError::Stripe(request_error) => PaymentError::Stripe {
            message: request_error
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
            code: request_error.code.as_ref().map(|c| format!("{c:?}")),
        },
        other => PaymentError::stripe(other.to_string()),
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    /// Create a Stripe Checkout session (Hosted approach)
    ///
    /// Returns a URL to redirect the user to Stripe's hosted checkout page.
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.client_reference_id = Some(&request.user_id);

        // Same id in metadata, read back when the primary field is missing
        let mut metadata = std::collections::HashMap::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), request.user_id.clone());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(request.price_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: "Premium Access".into(),
                    description: Some("Unlimited AI prompts".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::stripe("No checkout URL returned"))?;

        tracing::info!(session_id = %session.id, user_id = %request.user_id, "Checkout session created");

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession> {
        let id = session_id.parse::<CheckoutSessionId>().map_err(|_| PaymentError::Stripe {
            message: format!("Invalid checkout session id: {session_id}"),
            code: Some("resource_missing".into()),
        })?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(map_stripe_error)?;

        Ok(session.into())
    }

    async fn latest_session_for_customer(&self, customer_id: &str) -> Result<Option<PaymentSession>> {
        let customer = customer_id
            .parse::<CustomerId>()
            .map_err(|_| PaymentError::stripe(format!("Invalid customer id: {customer_id}")))?;

        let mut params = ListCheckoutSessions::new();
        params.customer = Some(customer);
        params.limit = Some(1);

        let list = StripeCheckoutSession::list(&self.client, &params)
            .await
            .map_err(map_stripe_error)?;

        Ok(list.data.into_iter().next().map(PaymentSession::from))
    }
}

/// Base URL for checkout redirects.
///
/// Precedence: configured URL, then `<proto>://<host>` from the request
/// (`proto` from `x-forwarded-proto`, default `http`), then
/// `FALLBACK_BASE_URL`. The result must be an absolute http(s) URL.
pub fn resolve_base_url(
    configured: Option<&str>,
    host: Option<&str>,
    forwarded_proto: Option<&str>,
) -> Result<String> {
    let candidate = configured
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            host.map(str::trim).filter(|h| !h.is_empty()).map(|h| {
                let proto = forwarded_proto
                    .and_then(|p| p.split(',').next())
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .unwrap_or("http");
                format!("{proto}://{h}")
            })
        })
        .unwrap_or_else(|| FALLBACK_BASE_URL.to_string());

    let url = Url::parse(&candidate)
        .map_err(|e| PaymentError::Config(format!("Invalid base URL '{candidate}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(PaymentError::Config(format!(
            "Base URL must be an absolute http(s) URL: {candidate}"
        )));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls() {
        let request = CheckoutRequest::for_user("u1", "https://mindprompt.app/", PREMIUM_PRICE_CENTS);
        assert_eq!(
            request.success_url,
            "https://mindprompt.app/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://mindprompt.app/canceled");
        assert_eq!(request.price_cents, 999);
    }

    #[test]
    fn test_correlation_prefers_primary() {
        let mut session = PaymentSession {
            id: "cs_1".into(),
            client_reference_id: Some("u1".into()),
            metadata_user_id: Some("u2".into()),
            payment_status: PaymentStatus::Paid,
            customer: None,
        };
        assert_eq!(session.correlation_id(), Some("u1"));

        session.client_reference_id = Some(String::new());
        assert_eq!(session.correlation_id(), Some("u2"));

        session.metadata_user_id = None;
        assert_eq!(session.correlation_id(), None);
    }

    #[test]
    fn test_unknown_payment_status() {
        let status: PaymentStatus = serde_json::from_str(r#""processing""#).unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
        assert!(!status.is_paid());
    }

    #[test]
    fn test_base_url_precedence() {
        assert_eq!(
            resolve_base_url(Some("https://app.example/"), Some("ignored:1"), None).unwrap(),
            "https://app.example"
        );
        assert_eq!(
            resolve_base_url(None, Some("mindprompt.app"), Some("https, http")).unwrap(),
            "https://mindprompt.app"
        );
        assert_eq!(
            resolve_base_url(None, Some("localhost:8080"), None).unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(resolve_base_url(None, None, None).unwrap(), FALLBACK_BASE_URL);
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = resolve_base_url(Some("ftp://files.example"), None, None).unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));

        let err = resolve_base_url(None, Some("bad host"), None).unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }
}
