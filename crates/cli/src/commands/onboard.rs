//! `dayloop onboard`: First-time setup.

use dayloop_config::AppConfig;

use super::CommandResult;

const SAMPLE_RECORDS: &str = r#"{
  "journal": [],
  "expenses": [],
  "activities": [],
  "habits": []
}
"#;

pub async fn run() -> CommandResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Dayloop — First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        tokio::fs::create_dir_all(&config_dir).await?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load_from(&config_path).map_err(|e| format!("Invalid config: {e}"))?;
    let records_path = config.records_path();
    if !records_path.exists() {
        if let Some(parent) = records_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&records_path, SAMPLE_RECORDS).await?;
        println!("  Created empty records file: {}", records_path.display());
    }

    println!("\n  Next steps:");
    println!("   1. Add your API key to {} (or export OPENROUTER_API_KEY)", config_path.display());
    println!("   2. Export your dashboard records to {}", records_path.display());
    println!("   3. Run: dayloop recap\n");

    Ok(())
}
