//! Application State

use std::sync::Arc;

use mindprompt_core::{PromptSynthesizer, RetryPolicy};
use mindprompt_payments::{
    AccountStore, BillingProvider, Clock, CreditLedger, PREMIUM_PRICE_CENTS, PaymentVerifier,
    PremiumWriter, WebhookHandler,
};

/// Payment collaborators, present only when Stripe is configured
pub struct Payments {
    pub billing: Arc<dyn BillingProvider>,
    pub webhooks: WebhookHandler,
    pub verifier: PaymentVerifier,
}

impl Payments {
    /// Wire the webhook and verification paths around one premium writer
    pub fn new(
        billing: Arc<dyn BillingProvider>,
        webhook_secret: &str,
        writer: Arc<PremiumWriter>,
    ) -> Self {
        let store = writer.store().clone();
        Self {
            webhooks: WebhookHandler::new(webhook_secret, billing.clone(), writer.clone()),
            verifier: PaymentVerifier::new(billing.clone(), store, writer),
            billing,
        }
    }

    /// Override the verification retry policies
    #[must_use]
    pub fn with_verify_retry(mut self, write: RetryPolicy, confirm: RetryPolicy) -> Self {
        self.verifier = self.verifier.with_retry(write, confirm);
        self
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Account document store
    pub store: Arc<dyn AccountStore>,

    /// Daily credit accounting
    pub ledger: Arc<CreditLedger>,

    /// Mind map to prompt conversion
    pub synthesizer: Arc<PromptSynthesizer>,

    /// Stripe collaborators (optional - None if not configured)
    pub payments: Option<Arc<Payments>>,

    /// Fixed base URL for checkout redirects
    pub public_base_url: Option<String>,

    pub price_cents: i64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        synthesizer: PromptSynthesizer,
    ) -> Self {
        Self {
            ledger: Arc::new(CreditLedger::new(store.clone(), clock)),
            store,
            synthesizer: Arc::new(synthesizer),
            payments: None,
            public_base_url: None,
            price_cents: PREMIUM_PRICE_CENTS,
        }
    }

    #[must_use]
    pub fn with_payments(mut self, payments: Payments) -> Self {
        self.payments = Some(Arc::new(payments));
        self
    }

    #[must_use]
    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url;
        self
    }

    #[must_use]
    pub fn with_price_cents(mut self, cents: i64) -> Self {
        self.price_cents = cents;
        self
    }
}
