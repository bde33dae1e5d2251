//! HTTP API gateway for Riskpilot.
//!
//! Exposes the v1 API (ask, session listing, transcripts) plus a health
//! check. The gateway is a thin shell: request/response DTOs and status
//! mapping live here, everything else is delegated to the orchestrator.
//!
//! Built on Axum for async HTTP.

pub mod api_v1;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use riskpilot_orchestrator::{Orchestrator, PromptBuilder, RetryPolicy};
use riskpilot_session::SessionStore;

/// Shared application state for the gateway.
///
/// The orchestrator owns all mutable state (the session store); the
/// gateway itself only carries read-only deployment facts for /health.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    pub model: String,
    pub has_api_key: bool,
}

pub type SharedState = Arc<GatewayState>;

/// How often the background sweep looks for idle sessions.
const GC_INTERVAL: Duration = Duration::from_secs(60);

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Permissive CORS (the browser frontend may be served from anywhere)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Spawns a background task that periodically evicts idle sessions, then
/// serves until the process is stopped.
pub async fn start(
    config: riskpilot_config::AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    let client = riskpilot_providers::build_from_config(&config)
        .ok_or("No API key configured — set MISTRAL_API_KEY or RISKPILOT_API_KEY")?;
    let has_api_key = config.has_api_key();

    let store = Arc::new(SessionStore::new(
        Duration::from_secs(config.session.idle_ttl_secs),
        config.session.max_sessions,
    ));

    let prompt = PromptBuilder::new(&config.model, config.prompt.system_prompt())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_context_budget(config.prompt.context_budget_tokens);

    let retry = RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
        Duration::from_millis(config.retry.max_delay_ms),
    );

    let orchestrator = Orchestrator::new(client, store.clone(), prompt).with_retry(retry);

    let state = Arc::new(GatewayState {
        orchestrator,
        model: config.model.clone(),
        has_api_key,
    });

    // Idle-session sweep. In-flight sessions are skipped by the store.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(GC_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle();
            if evicted > 0 {
                debug!(evicted, "Evicted idle sessions");
            }
        }
    });

    let app = build_router(state);

    info!(addr = %addr, model = %config.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    has_api_key: bool,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<SharedState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        has_api_key: state.has_api_key,
    })
}
