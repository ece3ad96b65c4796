//! mindprompt HTTP Server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mindprompt_core::PromptSynthesizer;
use mindprompt_payments::{
    AccountStore, FirestoreAccountStore, MemoryAccountStore, PremiumWriter, StripeClient,
    SystemClock,
};
use mindprompt_runtime::{LlmProvider, MistralConfig, MistralProvider};
use mindprompt_server::{
    AppState, Payments, build_router,
    config::{ServerConfig, StoreBackend},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Account store
    let store: Arc<dyn AccountStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory account store - data is lost on restart");
            Arc::new(MemoryAccountStore::new())
        }
        StoreBackend::Firestore => Arc::new(FirestoreAccountStore::from_env()?),
    };
    tracing::info!(backend = store.backend(), "Account store ready");

    // Model provider
    let mistral = MistralConfig::from_env();
    let options = mistral.generation_options();
    let provider = Arc::new(MistralProvider::from_config(mistral)?);

    match provider.health_check().await {
        Ok(true) => tracing::info!(model = %options.model, "Connected to Mistral"),
        Ok(false) | Err(_) => {
            tracing::warn!("Mistral not reachable - prompts will use the local template");
        }
    }

    let synthesizer = PromptSynthesizer::new(provider, options);

    // Build application state
    let mut state = AppState::new(store.clone(), Arc::new(SystemClock), synthesizer)
        .with_public_base_url(config.public_base_url.clone())
        .with_price_cents(config.price_cents);

    if let Some(stripe) = &config.stripe {
        let billing = Arc::new(StripeClient::new(&stripe.secret_key));
        let writer = Arc::new(PremiumWriter::new(store));
        state = state.with_payments(Payments::new(billing, &stripe.webhook_secret, writer));
        tracing::info!("Stripe configured");
    } else {
        tracing::warn!("Stripe not configured - payments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    tracing::info!("mindprompt server running on http://{}", config.bind_address);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /api/accounts                    - Create account");
    tracing::info!("  GET  /api/credits/:user_id            - Remaining credits");
    tracing::info!("  POST /api/credits/:user_id/consume    - Spend a credit");
    tracing::info!("  POST /api/generate-prompt             - Mind map to prompt");
    tracing::info!("  POST /api/create-checkout-session     - Stripe checkout");
    tracing::info!("  POST /api/webhook/stripe              - Stripe webhook");
    tracing::info!("  POST /api/verify-payment              - Confirm payment");

    axum::serve(listener, app).await?;

    Ok(())
}
