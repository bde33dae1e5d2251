//! Hosted model API clients for Riskpilot.
//!
//! All clients implement the `riskpilot_core::ModelClient` trait. The
//! orchestrator owns retry and backoff; a client performs exactly one
//! network call per `send()`.

pub mod mistral;

pub use mistral::MistralClient;

use std::sync::Arc;

use riskpilot_config::AppConfig;
use riskpilot_core::ModelClient;

/// Build the configured model client.
///
/// Returns `None` when no API key is available — callers surface that as a
/// configuration problem rather than constructing a client that can only
/// fail with auth errors.
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn ModelClient>> {
    let api_key = config.api_key.as_deref()?;
    let client = MistralClient::new(api_key)
        .with_base_url(&config.api_url)
        .with_timeout(std::time::Duration::from_secs(config.request_timeout_secs));
    Some(Arc::new(client))
}
