//! `riskpilot ask` — One-shot question from the terminal.
//!
//! Spins up the same orchestrator the gateway uses, but with a throwaway
//! session, so answers match what the HTTP API would return.

use std::sync::Arc;
use std::time::Duration;

use riskpilot_config::AppConfig;
use riskpilot_core::message::Query;
use riskpilot_orchestrator::{Orchestrator, PromptBuilder, RetryPolicy};
use riskpilot_session::SessionStore;

pub async fn run(question: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early and give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export MISTRAL_API_KEY='...'");
        eprintln!("    export RISKPILOT_API_KEY='...'");
        eprintln!();
        eprintln!("  Or add api_key to riskpilot.toml.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let client = riskpilot_providers::build_from_config(&config)
        .ok_or("No model client could be built from the configuration")?;

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

    let orchestrator = Orchestrator::new(client, store, prompt).with_retry(retry);

    let answer = orchestrator.handle(Query::new(None, question)).await?;

    println!("{}", answer.answer);

    Ok(())
}
