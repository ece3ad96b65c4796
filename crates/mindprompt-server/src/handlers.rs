//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
};
use serde::{Deserialize, Serialize};

use mindprompt_core::{MindMap, MindMapNode, PromptCategory, SynthesisSource};
use mindprompt_payments::{
    CheckoutRequest, CreditStatus, PaymentError, SIGNATURE_HEADER, UserAccount,
    VerificationError, WebhookAction, resolve_base_url,
};

use crate::state::{AppState, Payments};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_provider: String,
    pub model_reachable: bool,
    pub store_backend: &'static str,
    pub payments_configured: bool,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            ..Default::default()
        }),
    )
}

/// Unwrap a JSON body, answering malformed input with the usual error shape
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        let (status, Json(mut body)) = api_error(
            rejection.status(),
            "INVALID_REQUEST_BODY",
            "Request body is not valid JSON for this endpoint",
        );
        body.details = Some(rejection.body_text());
        (status, Json(body))
    })
}

fn payments_disabled() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "PAYMENTS_DISABLED",
        "Payments not configured",
    )
}

fn require_payments(state: &AppState) -> Result<&Payments, ApiError> {
    state.payments.as_deref().ok_or_else(payments_disabled)
}

fn require_user_id(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "MISSING_USER_ID",
            "User ID is required",
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    pub granted: bool,
    pub credits: CreditStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePromptRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default, alias = "boxes")]
    pub nodes: Vec<MindMapNode>,
    #[serde(default)]
    pub prompt_type: PromptCategory,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePromptResponse {
    pub success: bool,
    pub optimized_prompt: String,
    pub prompt_type: PromptCategory,
    pub source: SynthesisSource,
    pub credits: CreditStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub action: WebhookAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub is_premium: bool,
    pub already_premium: bool,
    pub message: &'static str,
    pub user: UserAccount,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.synthesizer.provider();
    let model_reachable = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_provider: provider.name().to_string(),
        model_reachable,
        store_backend: state.store.backend(),
        payments_configured: state.payments.is_some(),
    })
}

/// Create the account document on first sign-in
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Json<UserAccount>, ApiError> {
    let payload = json_body(payload)?;
    require_user_id(&payload.user_id)?;

    let account = state
        .ledger
        .ensure_account(&payload.user_id, payload.email.as_deref().unwrap_or_default())
        .await
        .map_err(|e| {
            tracing::error!(user_id = %payload.user_id, error = %e, "Account provisioning failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.user_message())
        })?;

    Ok(Json(account))
}

/// Remaining credits, resetting the daily counter if needed
pub async fn get_credits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<CreditStatus> {
    Json(state.ledger.check_and_reset_credits(&user_id).await)
}

/// Spend one credit
pub async fn consume_credit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<ConsumeResponse> {
    let granted = state.ledger.consume_credit(&user_id).await;
    let credits = state.ledger.check_and_reset_credits(&user_id).await;
    Json(ConsumeResponse { granted, credits })
}

/// Convert a mind map into a prompt, spending one credit
pub async fn generate_prompt(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePromptRequest>, JsonRejection>,
) -> Result<Json<GeneratePromptResponse>, ApiError> {
    let payload = json_body(payload)?;
    require_user_id(&payload.user_id)?;

    if payload.nodes.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MIND_MAP",
            "The mind map has no nodes",
        ));
    }

    if !state.ledger.consume_credit(&payload.user_id).await {
        return Err(api_error(
            StatusCode::PAYMENT_REQUIRED,
            "NO_CREDITS",
            "No credits remaining today. Upgrade to premium for unlimited prompts.",
        ));
    }

    let map = MindMap::from_nodes(payload.nodes);
    let synthesis = state.synthesizer.synthesize(&map, payload.prompt_type).await;
    let credits = state.ledger.check_and_reset_credits(&payload.user_id).await;

    tracing::info!(
        user_id = %payload.user_id,
        prompt_type = %synthesis.category,
        source = ?synthesis.source,
        "Prompt generated"
    );

    Ok(Json(GeneratePromptResponse {
        success: true,
        optimized_prompt: synthesis.text,
        prompt_type: synthesis.category,
        source: synthesis.source,
        credits,
    }))
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let payload = json_body(payload)?;
    let payments = require_payments(&state)?;
    require_user_id(&payload.user_id)?;

    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok());
    let base_url = resolve_base_url(state.public_base_url.as_deref(), host, proto)
    .map_err(|e| {
        tracing::error!(error = %e, "Checkout base URL unusable");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", e.to_string())
    })?;

    let request = CheckoutRequest::for_user(&payload.user_id, &base_url, state.price_cents);
    let session = payments
        .billing
        .create_checkout_session(&request)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %payload.user_id, error = %e, "Checkout error");
            let (status, Json(mut body)) = api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CHECKOUT_ERROR",
                e.user_message(),
            );
            body.provider_code = e.provider_code().map(ToString::to_string);
            body.details = Some(e.to_string());
            (status, Json(body))
        })?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

fn webhook_error(err: &PaymentError) -> ApiError {
    match err {
        PaymentError::WebhookSignature(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature")
        }
        PaymentError::WebhookParse(msg) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", msg.clone())
        }
        PaymentError::MissingCorrelation(_) => api_error(
            StatusCode::BAD_REQUEST,
            "MISSING_USER_ID",
            "No user ID found in session",
        ),
        other => {
            let (status, Json(mut body)) = api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "WEBHOOK_ERROR",
                "Webhook processing failed",
            );
            body.provider_code = other.provider_code().map(ToString::to_string);
            body.details = Some(other.to_string());
            (status, Json(body))
        }
    }
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let payments = require_payments(&state)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing Stripe signature",
            )
        })?;

    let outcome = payments
        .webhooks
        .process(&body, signature)
        .await
        .map_err(|e| {
            if matches!(
                e,
                PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_)
            ) {
                tracing::warn!(error = %e, "Webhook rejected");
            } else {
                tracing::error!(error = %e, "Webhook processing error");
            }
            webhook_error(&e)
        })?;

    Ok(Json(WebhookAck {
        received: true,
        event_type: outcome.event_type,
        action: outcome.action,
    }))
}

fn verification_error(failure: VerificationError) -> ApiError {
    let status = StatusCode::from_u16(failure.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = serde_json::to_value(failure.kind)
        .ok()
        .and_then(|v| v.as_str().map(ToString::to_string))
        .unwrap_or_default();

    (
        status,
        Json(ErrorResponse {
            error: failure.message,
            code,
            provider_code: failure.provider_code,
            payment_status: failure.payment_status,
            expected: failure.expected,
            actual: failure.actual,
            details: failure.details,
        }),
    )
}

/// Confirm a paid session from the checkout return page
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let payload = json_body(payload)?;
    let payments = require_payments(&state)?;

    let verified = payments
        .verifier
        .verify(&payload.session_id, &payload.user_id)
        .await
        .map_err(|failure| {
            tracing::warn!(
                session_id = %payload.session_id,
                user_id = %payload.user_id,
                error = %failure,
                "Payment verification failed"
            );
            verification_error(failure)
        })?;

    Ok(Json(VerifyPaymentResponse {
        success: true,
        is_premium: verified.account.is_premium,
        already_premium: verified.already_premium,
        message: if verified.already_premium {
            "User is already premium"
        } else {
            "Premium status updated successfully"
        },
        user: verified.account,
    }))
}
