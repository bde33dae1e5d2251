//! Mistral chat completions client.
//!
//! A thin adapter over the hosted API:
//! - `Authorization: Bearer` header authentication
//! - One POST to `/v1/chat/completions` per `send()`
//! - Failure classification: 401/403 auth, 429 rate limit, 5xx/connection
//!   transient, malformed payload invalid-response
//! - Per-request timeout enforced by the HTTP client; an elapsed timeout
//!   surfaces as a transient failure

use async_trait::async_trait;
use riskpilot_core::client::{ModelClient, ModelReply, ModelRequest, Usage};
use riskpilot_core::error::ModelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Mistral chat completions API.
pub struct MistralClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl MistralClient {
    /// Create a new Mistral client with the default timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout_inner(api_key.into(), DEFAULT_TIMEOUT)
    }

    fn with_timeout_inner(api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "mistral".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Rebuild with a custom per-request timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let mut rebuilt = Self::with_timeout_inner(self.api_key, timeout);
        rebuilt.base_url = self.base_url;
        rebuilt
    }

    fn to_api_messages(request: &ModelRequest) -> Vec<ApiMessage> {
        request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn reply_from_response(resp: ChatCompletionResponse) -> Result<ModelReply, ModelError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("response contained no choices".into()))?;

        Ok(ModelReply {
            content: choice.message.content,
            model: resp.model,
            usage: resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl ModelClient for MistralClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(client = "mistral", model = %request.model, messages = body.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(e.to_string())
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(ModelError::Auth("Invalid Mistral API key".into()));
        }
        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if status >= 500 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Mistral API server error");
            return Err(ModelError::Network(format!(
                "upstream returned {status}: {error_body}"
            )));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Mistral API rejected request");
            return Err(ModelError::InvalidResponse(format!(
                "unexpected status {status}: {error_body}"
            )));
        }

        let api_resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("failed to parse payload: {e}")))?;

        Self::reply_from_response(api_resp)
    }
}

// --- Mistral API wire types ---

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
