//! # mindprompt-payments
//!
//! Account documents, the daily credit ledger and premium upgrades paid
//! through Stripe Checkout.
//!
//! ## Reconciliation
//!
//! A paid checkout reaches the account document by two independent paths.
//! Both end in the same idempotent `PremiumWriter::set_premium(user, true)`,
//! so a race between them costs at most one redundant write.
//!
//! ```text
//!                 ┌─────────────────┐
//!  upgrade ──────▶│  Stripe Hosted  │──── redirect ────┐
//!                 │  Checkout Page  │                  │
//!                 └────────┬────────┘                  ▼
//!                          │ webhook (push)     return page (pull)
//!                          ▼                           │
//!                 ┌─────────────────┐         ┌────────▼────────┐
//!                 │ WebhookHandler  │         │ PaymentVerifier │
//!                 └────────┬────────┘         └────────┬────────┘
//!                          └──────────┬────────────────┘
//!                                     ▼
//!                            ┌─────────────────┐      ┌──────────────┐
//!                            │  PremiumWriter  │─────▶│ AccountStore │
//!                            └─────────────────┘      └──────────────┘
//! ```
//!
//! The webhook path acts only on deliveries `stripe::Webhook` has verified
//! and relies on Stripe redelivering on a non-2xx answer. The
//! pull path retries the write itself, then re-reads until the flag is
//! visible.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mindprompt_payments::{CheckoutRequest, StripeClient, BillingProvider};
//!
//! let client = StripeClient::new("sk_test_xxx");
//! let request = CheckoutRequest::for_user("user-123", "https://mindprompt.app", 999);
//! let session = client.create_checkout_session(&request).await?;
//!
//! // Redirect user to: session.url
//! ```

mod account;
mod checkout;
mod error;
mod firestore;
mod ledger;
mod premium;
mod verification;
mod webhook;

pub use account::{AccountPatch, AccountStore, MemoryAccountStore, UserAccount};
pub use checkout::{
    BillingProvider, CheckoutRequest, CheckoutSession, FALLBACK_BASE_URL, PREMIUM_PRICE_CENTS,
    PaymentSession, PaymentStatus, StripeClient, USER_ID_METADATA_KEY, resolve_base_url,
};
pub use error::{PaymentError, Result};
pub use firestore::{FirestoreAccountStore, FirestoreConfig};
pub use ledger::{
    Clock, CreditLedger, CreditStatus, DAILY_CREDIT_CAP, FixedClock, SystemClock,
    UNLIMITED_CREDITS,
};
pub use premium::{DEFAULT_SETTLE_DELAY, PremiumWriter};
pub use verification::{
    CONFIRM_RETRY, PaymentVerifier, VerificationError, VerificationErrorKind, VerifiedPayment,
    WRITE_RETRY,
};
pub use webhook::{SIGNATURE_HEADER, WebhookAction, WebhookHandler, WebhookOutcome};
