//! Request orchestration for Riskpilot.
//!
//! The orchestrator is the single entry point for a query: it resolves the
//! session, validates input, composes the prompt, calls the model client
//! under a retry/backoff policy, and records the answer. The whole
//! sequence runs under the session's lock so concurrent queries for the
//! same session cannot interleave; queries for different sessions proceed
//! in parallel.

pub mod prompt;
pub mod retry;
pub mod token;

pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use riskpilot_core::client::ModelClient;
use riskpilot_core::error::{ModelError, OrchestratorError, SessionError};
use riskpilot_core::message::{Message, Query, SessionId};
use riskpilot_session::SessionStore;
use serde::Serialize;
use tracing::{error, info, warn};

/// The answer returned to the caller on success.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantAnswer {
    pub session_id: SessionId,
    pub answer: String,
    pub model: String,
}

/// Coordinates session lookup, prompt construction, the upstream call,
/// and response recording.
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    store: Arc<SessionStore>,
    prompt: PromptBuilder,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ModelClient>, store: Arc<SessionStore>, prompt: PromptBuilder) -> Self {
        Self {
            client,
            store,
            prompt,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The session store backing this orchestrator.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one query end to end.
    ///
    /// On failure past the point where the user message was appended, the
    /// history is left as-is: the user message stays, no assistant message
    /// is added. A later retry by the caller then proceeds with correct
    /// context instead of duplicating content.
    pub async fn handle(&self, query: Query) -> Result<AssistantAnswer, OrchestratorError> {
        // Blank queries are rejected before any session work so a junk
        // request cannot mint an empty session.
        if query.text.trim().is_empty() {
            return Err(OrchestratorError::InvalidQuery(
                "query text must not be empty".into(),
            ));
        }

        let mut session = self
            .store
            .checkout(query.session_id.as_deref())
            .await
            .map_err(|SessionError::UnknownSession(id)| OrchestratorError::UnknownSession(id))?;

        session.append(Message::user(&query.text));

        // History excludes the message just appended; the builder adds the
        // new query itself as the final user turn.
        let history_len = session.messages().len() - 1;
        let request = self
            .prompt
            .build(&session.messages()[..history_len], &query.text)
            .map_err(|e| OrchestratorError::InputTooLarge(e.to_string()))?;

        let reply = self.send_with_retry(&session.id().clone(), request).await?;

        session.append(Message::assistant(&reply.content));

        Ok(AssistantAnswer {
            session_id: session.id().clone(),
            answer: reply.content,
            model: reply.model,
        })
    }

    /// Call the model client, retrying retryable failures with exponential
    /// backoff. Auth and contract violations fail immediately.
    async fn send_with_retry(
        &self,
        session_id: &SessionId,
        request: riskpilot_core::client::ModelRequest,
    ) -> Result<riskpilot_core::client::ModelReply, OrchestratorError> {
        let mut attempt = 1u32;
        loop {
            match self.client.send(request.clone()).await {
                Ok(reply) => {
                    info!(session = %session_id, attempt, "Model call succeeded");
                    return Ok(reply);
                }
                Err(err) if err.is_retryable() => {
                    let delay = match &err {
                        ModelError::RateLimited { retry_after_secs } => self
                            .retry
                            .delay_after_hinted(attempt, Duration::from_secs(*retry_after_secs)),
                        _ => self.retry.delay_after(attempt),
                    };

                    match delay {
                        Some(delay) => {
                            warn!(
                                session = %session_id,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Retryable model failure, backing off"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            warn!(session = %session_id, attempt, error = %err, "Retry budget exhausted");
                            return Err(OrchestratorError::UpstreamUnavailable(err.to_string()));
                        }
                    }
                }
                Err(ModelError::Auth(reason)) => {
                    error!(session = %session_id, %reason, "Upstream rejected credential");
                    return Err(OrchestratorError::Auth);
                }
                Err(ModelError::InvalidResponse(diag)) => {
                    error!(session = %session_id, diagnostics = %diag, "Upstream broke response contract");
                    return Err(OrchestratorError::InvalidResponse(diag));
                }
                // Remaining variants are retryable and handled above.
                Err(err) => {
                    return Err(OrchestratorError::UpstreamUnavailable(err.to_string()));
                }
            }
        }
    }
}
