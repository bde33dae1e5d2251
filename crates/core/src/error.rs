//! Error types for the Riskpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own enum; everything is folded into the closed caller-facing
//! `OrchestratorError` set at the orchestrator boundary.

use thiserror::Error;

/// Failures from the upstream model API, classified for retry decisions.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Invalid or missing credential. Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Upstream asked us to slow down. Retryable with backoff.
    #[error("Rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Connection failure or upstream 5xx. Retryable.
    #[error("Network error: {0}")]
    Network(String),

    /// The request timeout elapsed. Treated as a transient failure.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The upstream answered but the payload broke contract. Never retried.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether the orchestrator may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. } | ModelError::Network(_) | ModelError::Timeout(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

#[derive(Debug, Clone, Error)]
pub enum PromptError {
    #[error("Query of ~{query_tokens} tokens exceeds the {budget} token budget")]
    InputTooLarge { query_tokens: usize, budget: usize },
}

/// The closed set of caller-facing error kinds.
///
/// Internal distinctions (which retry attempt failed, which status code the
/// upstream returned) stay in the logs; callers see only these kinds.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query too large: {0}")]
    InputTooLarge(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Upstream authentication failed — check the configured API key")]
    Auth,

    #[error("Upstream unavailable after retries: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl OrchestratorError {
    /// Stable machine-readable kind, used verbatim on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidQuery(_) => "invalid_query",
            OrchestratorError::InputTooLarge(_) => "input_too_large",
            OrchestratorError::UnknownSession(_) => "unknown_session",
            OrchestratorError::Auth => "auth",
            OrchestratorError::UpstreamUnavailable(_) => "upstream_unavailable",
            OrchestratorError::InvalidResponse(_) => "invalid_response",
        }
    }
}
