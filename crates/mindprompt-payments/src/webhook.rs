//! Stripe Webhook Handling
//!
//! Verifies signed webhook deliveries and maps checkout and subscription
//! lifecycle events onto premium-status writes. No state is kept between
//! events. Only a delivery whose signature checks out is ever acted on.

use std::sync::Arc;

use serde::Serialize;
use stripe::{Event, EventObject, EventType, SubscriptionStatus, Webhook, WebhookError};

use crate::checkout::{BillingProvider, PaymentSession};
use crate::error::{PaymentError, Result};
use crate::ledger::{Clock, SystemClock};
use crate::premium::PremiumWriter;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verified event, reduced to what premium status depends on
#[derive(Clone, Debug)]
enum WebhookEvent {
    /// Checkout finished, possibly paid
    CheckoutCompleted(PaymentSession),

    /// Subscription updated or deleted
    SubscriptionChanged {
        subscription_id: String,
        customer: String,
        status: SubscriptionStatus,
        deleted: bool,
    },

    /// Unhandled event type
    Other,
}

/// What handling an event did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookAction {
    PremiumSet { user_id: String, is_premium: bool },
    Ignored { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub event_type: String,
    #[serde(flatten)]
    pub action: WebhookAction,
}

fn map_webhook_error(error: WebhookError) -> PaymentError {
    match error {
        WebhookError::BadParse(e) => PaymentError::WebhookParse(e.to_string()),
        other => PaymentError::WebhookSignature(other.to_string()),
    }
}

/// Parse Stripe event into our event type
fn parse_webhook_event(event: Event) -> Result<WebhookEvent> {
    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                Ok(WebhookEvent::CheckoutCompleted(session.into()))
            } else {
                Err(PaymentError::WebhookParse("Invalid checkout session data".into()))
            }
        }

        EventType::CustomerSubscriptionUpdated | EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(sub) = event.data.object {
                Ok(WebhookEvent::SubscriptionChanged {
                    subscription_id: sub.id.to_string(),
                    customer: sub.customer.id().to_string(),
                    status: sub.status,
                    deleted: event.type_ == EventType::CustomerSubscriptionDeleted,
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid subscription data".into()))
            }
        }

        _ => Ok(WebhookEvent::Other),
    }
}

/// Webhook handler
pub struct WebhookHandler {
    secret: String,
    billing: Arc<dyn BillingProvider>,
    writer: Arc<PremiumWriter>,
    clock: Arc<dyn Clock>,
}

impl WebhookHandler {
    pub fn new(
        secret: impl Into<String>,
        billing: Arc<dyn BillingProvider>,
        writer: Arc<PremiumWriter>,
    ) -> Self {
        Self {
            secret: secret.into(),
            billing,
            writer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock the signature timestamp tolerance is measured against
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Verify a delivery against its `stripe-signature` header, then act on it
    pub async fn process(&self, payload: &[u8], signature: &str) -> Result<WebhookOutcome> {
        let payload = std::str::from_utf8(payload)
            .map_err(|e| PaymentError::WebhookParse(format!("Invalid UTF-8: {e}")))?;

        let event = Webhook::construct_event_with_timestamp(
            payload,
            signature,
            &self.secret,
            self.clock.now().timestamp(),
        )
        .map_err(map_webhook_error)?;

        let event_type = event.type_.to_string();
        tracing::info!(event_type = %event_type, event_id = %event.id, "Processing Stripe webhook");

        let action = match parse_webhook_event(event)? {
            WebhookEvent::CheckoutCompleted(session) => self.checkout_completed(&session).await?,

            WebhookEvent::SubscriptionChanged {
                subscription_id,
                customer,
                status,
                deleted,
            } => {
                self.subscription_changed(&subscription_id, &customer, status, deleted)
                    .await?
            }

            WebhookEvent::Other => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                WebhookAction::Ignored {
                    reason: "unhandled event type".into(),
                }
            }
        };

        Ok(WebhookOutcome { event_type, action })
    }

    async fn checkout_completed(&self, session: &PaymentSession) -> Result<WebhookAction> {
        let user_id = session
            .correlation_id()
            .ok_or_else(|| PaymentError::MissingCorrelation(session.id.clone()))?;

        if !session.payment_status.is_paid() {
            tracing::info!(
                session_id = %session.id,
                status = %session.payment_status,
                "Checkout completed without payment"
            );
            return Ok(WebhookAction::Ignored {
                reason: format!("payment status {}", session.payment_status),
            });
        }

        self.writer.set_premium(user_id, true).await?;
        tracing::info!(session_id = %session.id, user_id, "Premium granted from checkout");

        Ok(WebhookAction::PremiumSet {
            user_id: user_id.to_string(),
            is_premium: true,
        })
    }

    async fn subscription_changed(
        &self,
        subscription_id: &str,
        customer: &str,
        status: SubscriptionStatus,
        deleted: bool,
    ) -> Result<WebhookAction> {
        let session = self.billing.latest_session_for_customer(customer).await?;
        let Some(user_id) = session.as_ref().and_then(PaymentSession::correlation_id) else {
            tracing::warn!(subscription_id, customer, "No user found for subscription");
            return Ok(WebhookAction::Ignored {
                reason: "no user for customer".into(),
            });
        };

        let is_premium = !deleted
            && matches!(
                status,
                SubscriptionStatus::Active | SubscriptionStatus::Trialing
            );
        self.writer.set_premium(user_id, is_premium).await?;

        tracing::info!(
            subscription_id,
            user_id,
            status = %status,
            is_premium,
            "Premium updated from subscription"
        );

        Ok(WebhookAction::PremiumSet {
            user_id: user_id.to_string(),
            is_premium,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountStore, MemoryAccountStore, UserAccount};
    use crate::checkout::{CheckoutRequest, CheckoutSession, PaymentStatus};
    use crate::ledger::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use hmac::{Hmac, Mac};
    use serde_json::{Value, json};
    use sha2::Sha256;
    use std::time::Duration;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_740_000_000;

    /// Billing fake answering customer lookups from a fixed session
    struct CustomerBilling {
        latest: Option<PaymentSession>,
    }

    #[async_trait]
    impl BillingProvider for CustomerBilling {
        async fn create_checkout_session(&self, _: &CheckoutRequest) -> Result<CheckoutSession> {
            Err(PaymentError::stripe("not used"))
        }

        async fn retrieve_session(&self, _: &str) -> Result<PaymentSession> {
            Err(PaymentError::stripe("not used"))
        }

        async fn latest_session_for_customer(&self, _: &str) -> Result<Option<PaymentSession>> {
            Ok(self.latest.clone())
        }
    }

    async fn handler(latest: Option<PaymentSession>) -> (WebhookHandler, Arc<MemoryAccountStore>) {
        let store = Arc::new(MemoryAccountStore::new());
        store.insert(UserAccount::new("u1", "a@b.c", "2025-03-01")).await;
        let writer = Arc::new(PremiumWriter::new(store.clone()).with_settle_delay(Duration::ZERO));
        let clock = FixedClock::new(Utc.timestamp_opt(NOW, 0).unwrap());
        let handler = WebhookHandler::new(SECRET, Arc::new(CustomerBilling { latest }), writer)
            .with_clock(Arc::new(clock));
        (handler, store)
    }

    /// `t=<unix>,v1=<hex hmac>` over `<t>.<payload>`
    fn sign(secret: &str, payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn event(kind: &str, object: Value) -> String {
        json!({
            "id": "evt_1",
            "object": "event",
            "api_version": "2024-06-20",
            "created": NOW,
            "data": {"object": object},
            "livemode": false,
            "pending_webhooks": 1,
            "request": null,
            "type": kind
        })
        .to_string()
    }

    fn checkout_event(payment_status: &str, reference: Option<&str>, metadata: Value) -> String {
        event(
            "checkout.session.completed",
            json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "automatic_tax": {"enabled": false},
                "client_reference_id": reference,
                "created": NOW,
                "custom_fields": [],
                "custom_text": {},
                "customer": "cus_1",
                "expires_at": NOW + 86_400,
                "livemode": false,
                "metadata": metadata,
                "mode": "payment",
                "payment_method_types": ["card"],
                "payment_status": payment_status,
                "shipping_options": [],
                "status": "complete"
            }),
        )
    }

    fn subscription_event(kind: &str, status: &str) -> String {
        event(
            kind,
            json!({
                "id": "sub_1",
                "object": "subscription",
                "automatic_tax": {"enabled": false},
                "billing_cycle_anchor": NOW,
                "cancel_at_period_end": false,
                "created": NOW,
                "currency": "usd",
                "current_period_end": NOW + 2_592_000,
                "current_period_start": NOW,
                "customer": "cus_1",
                "items": {"object": "list", "data": [], "has_more": false, "url": "/v1/subscription_items"},
                "livemode": false,
                "metadata": {},
                "start_date": NOW,
                "status": status
            }),
        )
    }

    async fn deliver(handler: &WebhookHandler, payload: &str) -> Result<WebhookOutcome> {
        handler
            .process(payload.as_bytes(), &sign(SECRET, payload, NOW))
            .await
    }

    fn customer_session() -> PaymentSession {
        PaymentSession {
            id: "cs_old".into(),
            client_reference_id: Some("u1".into()),
            metadata_user_id: None,
            payment_status: PaymentStatus::Paid,
            customer: Some("cus_1".into()),
        }
    }

    #[tokio::test]
    async fn test_bad_signatures_never_reach_the_store() {
        let (handler, store) = handler(None).await;
        let payload = checkout_event("paid", Some("u1"), json!({}));

        let forged = sign("whsec_other", &payload, NOW);
        let stale = sign(SECRET, &payload, NOW - 301);
        for header in [forged.as_str(), stale.as_str(), "v1=abcd", "garbage"] {
            let err = handler.process(payload.as_bytes(), header).await.unwrap_err();
            assert!(matches!(err, PaymentError::WebhookSignature(_)), "{header}");
        }

        let tampered = payload.replace("cs_test_1", "cs_test_2");
        let err = handler
            .process(tampered.as_bytes(), &sign(SECRET, &payload, NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));

        assert!(!store.get("u1").await.unwrap().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_signed_garbage_is_parse_error() {
        let (handler, _) = handler(None).await;
        let err = deliver(&handler, r#"{"type":"checkout.session.completed"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParse(_)));
    }

    #[tokio::test]
    async fn test_paid_checkout_grants_premium() {
        let (handler, store) = handler(None).await;
        let outcome = deliver(&handler, &checkout_event("paid", Some("u1"), json!({})))
            .await
            .unwrap();

        assert_eq!(outcome.event_type, "checkout.session.completed");
        assert_eq!(
            outcome.action,
            WebhookAction::PremiumSet {
                user_id: "u1".into(),
                is_premium: true
            }
        );
        assert!(store.get("u1").await.unwrap().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_metadata_user_id_fallback() {
        let (handler, store) = handler(None).await;
        let outcome = deliver(&handler, &checkout_event("paid", None, json!({"userId": "u1"})))
            .await
            .unwrap();

        assert!(matches!(outcome.action, WebhookAction::PremiumSet { .. }));
        assert!(store.get("u1").await.unwrap().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_unpaid_checkout_is_noop() {
        let (handler, store) = handler(None).await;
        let outcome = deliver(&handler, &checkout_event("unpaid", Some("u1"), json!({})))
            .await
            .unwrap();
        assert!(matches!(outcome.action, WebhookAction::Ignored { .. }));

        let account = store.get("u1").await.unwrap().unwrap();
        assert!(!account.is_premium);
        assert!(account.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_checkout_without_user_is_malformed() {
        let (handler, _) = handler(None).await;
        let err = deliver(&handler, &checkout_event("paid", None, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MissingCorrelation(_)));
    }

    #[tokio::test]
    async fn test_write_failure_surfaces() {
        let (handler, _) = handler(None).await;
        let err = deliver(&handler, &checkout_event("paid", Some("ghost"), json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_subscription_status_drives_premium() {
        let (handler, store) = handler(Some(customer_session())).await;

        deliver(&handler, &subscription_event("customer.subscription.updated", "trialing"))
            .await
            .unwrap();
        assert!(store.get("u1").await.unwrap().unwrap().is_premium);

        deliver(&handler, &subscription_event("customer.subscription.updated", "past_due"))
            .await
            .unwrap();
        assert!(!store.get("u1").await.unwrap().unwrap().is_premium);

        deliver(&handler, &subscription_event("customer.subscription.updated", "active"))
            .await
            .unwrap();
        let outcome = deliver(
            &handler,
            &subscription_event("customer.subscription.deleted", "active"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.event_type, "customer.subscription.deleted");
        assert!(!store.get("u1").await.unwrap().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_subscription_without_session_is_ignored() {
        let (handler, _) = handler(None).await;
        let outcome = deliver(
            &handler,
            &subscription_event("customer.subscription.updated", "active"),
        )
        .await
        .unwrap();
        assert!(matches!(outcome.action, WebhookAction::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_unhandled_event_acknowledged() {
        let (handler, store) = handler(Some(customer_session())).await;
        let outcome = deliver(
            &handler,
            &subscription_event("customer.subscription.created", "active"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.event_type, "customer.subscription.created");
        assert!(matches!(outcome.action, WebhookAction::Ignored { .. }));
        assert!(!store.get("u1").await.unwrap().unwrap().is_premium);
    }
}
