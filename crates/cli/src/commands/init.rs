//! `riskpilot init` — Write a default config file.

use std::path::Path;

use riskpilot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Path::new("riskpilot.toml");

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Edit it manually or delete and re-run init.");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Created {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. export MISTRAL_API_KEY='...'");
    println!("  2. riskpilot serve");

    Ok(())
}
