//! The v1 REST API.
//!
//! One operation does the real work: `POST /v1/ask` hands the query to the
//! orchestrator and translates its closed error set into HTTP statuses.
//! The session endpoints are read-only views over the store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use riskpilot_core::error::OrchestratorError;
use riskpilot_core::message::Query;
use riskpilot_session::SessionSummary;

use crate::SharedState;

/// Build the /v1 sub-router.
pub fn v1_router() -> Router<SharedState> {
    Router::new()
        .route("/ask", post(ask_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(session_transcript_handler))
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    session_id: Option<String>,
    query: String,
}

#[derive(Serialize)]
struct AskResponse {
    session_id: String,
    answer: String,
    model: String,
}

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
}

#[derive(Serialize)]
struct TranscriptMessageDto {
    role: String,
    content: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    session_id: String,
    messages: Vec<TranscriptMessageDto>,
}

/// The error body returned for every non-2xx response.
///
/// `error_kind` is a stable machine-readable tag; `message` is for humans
/// and carries no internal details beyond what the kind already implies.
#[derive(Serialize)]
struct ErrorBody {
    error_kind: &'static str,
    message: String,
}

/// Map an orchestrator failure onto its HTTP status and wire body.
fn error_response(err: OrchestratorError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &err {
        OrchestratorError::InvalidQuery(_) | OrchestratorError::InputTooLarge(_) => {
            StatusCode::BAD_REQUEST
        }
        OrchestratorError::UnknownSession(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Auth => StatusCode::INTERNAL_SERVER_ERROR,
        OrchestratorError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorBody {
            error_kind: err.kind(),
            message: err.to_string(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<ErrorBody>)> {
    info!(
        query_len = payload.query.len(),
        continuing = payload.session_id.is_some(),
        "v1/ask request"
    );

    let answer = state
        .orchestrator
        .handle(Query::new(payload.session_id, payload.query))
        .await
        .map_err(error_response)?;

    Ok(Json(AskResponse {
        session_id: answer.session_id.0,
        answer: answer.answer,
        model: answer.model,
    }))
}

async fn list_sessions_handler(State(state): State<SharedState>) -> Json<SessionListResponse> {
    let sessions = state.orchestrator.store().list().await;
    Json(SessionListResponse { sessions })
}

async fn session_transcript_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, (StatusCode, Json<ErrorBody>)> {
    let session = state
        .orchestrator
        .store()
        .snapshot(&id)
        .await
        .ok_or_else(|| error_response(OrchestratorError::UnknownSession(id.clone())))?;

    let messages = session
        .messages
        .iter()
        .map(|m| TranscriptMessageDto {
            role: m.role.to_string(),
            content: m.content.clone(),
            timestamp: m.timestamp,
        })
        .collect();

    Ok(Json(TranscriptResponse {
        session_id: session.id.0,
        messages,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{build_router, GatewayState};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use riskpilot_core::client::{ModelClient, ModelReply, ModelRequest};
    use riskpilot_core::error::ModelError;
    use riskpilot_orchestrator::{Orchestrator, PromptBuilder, RetryPolicy};
    use riskpilot_session::SessionStore;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubClient {
        result: Mutex<Option<Result<ModelReply, ModelError>>>,
        answer: String,
    }

    #[async_trait::async_trait]
    impl ModelClient for StubClient {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send(&self, _request: ModelRequest) -> Result<ModelReply, ModelError> {
            if let Some(result) = self.result.lock().unwrap().take() {
                return result;
            }
            Ok(ModelReply {
                content: self.answer.clone(),
                model: "mistral-large-latest".into(),
                usage: None,
            })
        }
    }

    fn test_state_with(client: Arc<dyn ModelClient>) -> crate::SharedState {
        let store = Arc::new(SessionStore::new(Duration::from_secs(3600), 100));
        let prompt = PromptBuilder::new("mistral-large-latest", "Be precise.");
        let orchestrator =
            Orchestrator::new(client, store, prompt).with_retry(RetryPolicy::immediate(3));
        Arc::new(GatewayState {
            orchestrator,
            model: "mistral-large-latest".into(),
            has_api_key: true,
        })
    }

    pub(crate) fn test_state_answering(answer: &str) -> crate::SharedState {
        test_state_with(Arc::new(StubClient {
            result: Mutex::new(None),
            answer: answer.into(),
        }))
    }

    fn test_state_failing(err: ModelError) -> crate::SharedState {
        test_state_with(Arc::new(StubClient {
            result: Mutex::new(Some(Err(err))),
            answer: String::new(),
        }))
    }

    fn post_ask(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn ask_starts_a_new_session() {
        let app = build_router(test_state_answering("Exposure is moderate..."));

        let response = app
            .oneshot(post_ask(serde_json::json!({
                "query": "What is our exposure to interest-rate risk?"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["answer"], "Exposure is moderate...");
        assert!(json["session_id"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn ask_continues_an_existing_session() {
        let state = test_state_answering("answer");
        let app = build_router(state.clone());

        let first = app
            .clone()
            .oneshot(post_ask(serde_json::json!({"query": "first"})))
            .await
            .unwrap();
        let session_id = json_body(first).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let second = app
            .oneshot(post_ask(serde_json::json!({
                "session_id": session_id,
                "query": "second"
            })))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let json = json_body(second).await;
        assert_eq!(json["session_id"], session_id.as_str());

        let transcript = state
            .orchestrator
            .store()
            .snapshot(&session_id)
            .await
            .unwrap();
        assert_eq!(transcript.messages.len(), 4);
    }

    #[tokio::test]
    async fn blank_query_is_bad_request() {
        let app = build_router(test_state_answering("unreachable"));

        let response = app
            .oneshot(post_ask(serde_json::json!({"query": "   "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error_kind"], "invalid_query");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = build_router(test_state_answering("unreachable"));

        let response = app
            .oneshot(post_ask(serde_json::json!({
                "session_id": "no-such-session",
                "query": "hello"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error_kind"], "unknown_session");
    }

    #[tokio::test]
    async fn auth_failure_is_server_error() {
        let app = build_router(test_state_failing(ModelError::Auth("bad key".into())));

        let response = app
            .oneshot(post_ask(serde_json::json!({"query": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error_kind"], "auth");
        // The message must not leak upstream auth details.
        assert!(!json["message"].as_str().unwrap().contains("bad key"));
    }

    #[tokio::test]
    async fn invalid_upstream_response_is_bad_gateway() {
        let app = build_router(test_state_failing(ModelError::InvalidResponse(
            "no choices".into(),
        )));

        let response = app
            .oneshot(post_ask(serde_json::json!({"query": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["error_kind"], "invalid_response");
    }

    #[tokio::test]
    async fn transcript_endpoint_returns_ordered_messages() {
        let state = test_state_answering("the answer");
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_ask(serde_json::json!({"query": "the question"})))
            .await
            .unwrap();
        let session_id = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "the question");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "the answer");
    }

    #[tokio::test]
    async fn transcript_for_unknown_session_is_not_found() {
        let app = build_router(test_state_answering("unused"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_listing_reflects_activity() {
        let state = test_state_answering("answer");
        let app = build_router(state);

        for _ in 0..2 {
            app.clone()
                .oneshot(post_ask(serde_json::json!({"query": "q"})))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let sessions = json["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["message_count"], 2);
    }
}
