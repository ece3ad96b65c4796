//! API Client

use reqwest::{Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use mindprompt_core::{MindMap, MindMapNode, PromptCategory};

use crate::error::{ClientError, Result};

/// Remaining allowance as reported by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credits {
    pub remaining: u32,
    pub is_premium: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub is_premium: bool,
    pub credits_used_today: u32,
    pub last_reset_date: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    pub optimized_prompt: String,
    pub prompt_type: PromptCategory,
    /// `model` or `fallback`
    pub source: String,
    pub credits: Credits,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub session_id: String,
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub is_premium: bool,
    pub already_premium: bool,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    user_id: &'a str,
    nodes: &'a [MindMapNode],
    prompt_type: PromptCategory,
}

/// Typed client for the mindprompt HTTP API
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended by percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            error: "Request failed".into(),
            code: String::new(),
        });
        Err(ClientError::Api {
            status: status.as_u16(),
            code: body.code,
            message: body.error,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &[&str], body: &impl Serialize) -> Result<T> {
        let response = self.http.post(self.endpoint(path)?).json(body).send().await?;
        Self::decode(response).await
    }

    /// Create the account on first sign-in
    pub async fn create_account(&self, user_id: &str, email: Option<&str>) -> Result<Account> {
        self.post(
            &["api", "accounts"],
            &serde_json::json!({ "userId": user_id, "email": email }),
        )
        .await
    }

    pub async fn credits(&self, user_id: &str) -> Result<Credits> {
        let response = self
            .http
            .get(self.endpoint(&["api", "credits", user_id])?)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Turn the map into a prompt. Spends one credit.
    pub async fn generate_prompt(
        &self,
        user_id: &str,
        map: &MindMap,
        category: PromptCategory,
    ) -> Result<GeneratedPrompt> {
        self.post(
            &["api", "generate-prompt"],
            &GenerateBody {
                user_id,
                nodes: map.nodes(),
                prompt_type: category,
            },
        )
        .await
    }

    /// Start the premium upgrade; the caller redirects to `url`
    pub async fn create_checkout(&self, user_id: &str) -> Result<CheckoutLink> {
        self.post(
            &["api", "create-checkout-session"],
            &serde_json::json!({ "userId": user_id }),
        )
        .await
    }

    pub async fn verify_payment(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<PaymentConfirmation> {
        self.post(
            &["api", "verify-payment"],
            &serde_json::json!({ "sessionId": session_id, "userId": user_id }),
        )
        .await
    }
}
