//! `riskpilot doctor` — Diagnose configuration problems.

use std::path::Path;

use riskpilot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Riskpilot Doctor");
    println!("================\n");

    let mut issues = 0;

    let config_path = Path::new("riskpilot.toml");
    if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ok    Config file valid");
                println!("  ok    Model: {}", config.model);

                if config.has_api_key() {
                    println!("  ok    API key configured");
                } else {
                    println!("  warn  No API key — set MISTRAL_API_KEY or add api_key to riskpilot.toml");
                    issues += 1;
                }
            }
            Err(e) => {
                println!("  fail  Config file invalid: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  warn  No riskpilot.toml — run `riskpilot init` (defaults will be used)");
        match AppConfig::load() {
            Ok(config) if config.has_api_key() => println!("  ok    API key found in environment"),
            Ok(_) => {
                println!("  warn  No API key — set MISTRAL_API_KEY");
                issues += 1;
            }
            Err(e) => {
                println!("  fail  Default config invalid: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
