//! ModelClient trait — the abstraction over the hosted LLM API.
//!
//! A ModelClient knows how to send a composed prompt to the upstream model
//! and normalize the reply. The orchestrator calls `send()` without knowing
//! which backend is configured — the retry policy lives above this seam,
//! never inside an implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::Role;

/// One role/text pair in a composed prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The fully composed prompt sent upstream. Derived from session history
/// plus the new query; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "mistral-large-latest")
    pub model: String,

    /// Ordered role/text pairs, system prompt first
    pub messages: Vec<PromptMessage>,

    /// Temperature (low for evidence-based risk answers)
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A normalized successful reply from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    /// The generated answer text
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage, when the upstream reports it
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core ModelClient trait.
///
/// Implementations are stateless beyond their HTTP connection pool: one
/// `send()` is one network call with a request timeout. Failure
/// classification (auth vs. rate limit vs. transient) happens here so the
/// orchestrator can decide what is worth retrying.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "mistral").
    fn name(&self) -> &str;

    /// Send a composed prompt and get a normalized reply.
    async fn send(&self, request: ModelRequest) -> std::result::Result<ModelReply, ModelError>;
}
