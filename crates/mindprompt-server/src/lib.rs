//! mindprompt HTTP Server
//!
//! Axum router over the credit ledger, prompt synthesis and Stripe payment
//! reconciliation.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    consume_credit, create_account, create_checkout, generate_prompt, get_credits, health_check,
    stripe_webhook, verify_payment,
};
pub use crate::state::{AppState, Payments};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Accounts & credits
        .route("/api/accounts", post(create_account))
        .route("/api/credits/{user_id}", get(get_credits))
        .route("/api/credits/{user_id}/consume", post(consume_credit))
        // Prompt generation
        .route("/api/generate-prompt", post(generate_prompt))
        // Payments
        .route("/api/create-checkout-session", post(create_checkout))
        .route("/api/webhook/stripe", post(stripe_webhook))
        .route("/api/verify-payment", post(verify_payment))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
