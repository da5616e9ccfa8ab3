//! `dayloop status`: Show configuration and summary state.

use chrono::Utc;
use dayloop_config::AppConfig;

use super::{CommandResult, Runtime};

pub async fn run() -> CommandResult {
    let runtime = Runtime::bootstrap(false)?;
    let config = &runtime.config;

    println!("Dayloop Status");
    println!("==============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    if config.has_api_key() {
        let provider = dayloop_providers::build_from_config(config);
        let reachable = match provider.health_check().await {
            Ok(true) => "reachable".to_string(),
            Ok(false) => "rejected the request".to_string(),
            Err(e) => format!("unreachable ({e})"),
        };
        println!("  Provider API: {reachable}");
    }
    println!("  Models:       deep={} quick={} router={}", config.models.deep, config.models.quick, config.models.router);
    println!("  Budget:       {} tokens ({} reserved for reply)", config.budget.total_tokens, config.budget.reply_reserve);
    println!("  Week starts:  {}", config.cascade.week_start);
    println!("  Local store:  {}", config.local_store_path().display());
    println!(
        "  Remote store: {}",
        config.storage.remote_url.as_deref().unwrap_or("not configured")
    );
    println!("  Records:      {}", config.records_path().display());

    println!("\n  Summaries:");
    let summaries = runtime.assistant.summaries().all().await?;
    if summaries.is_empty() {
        println!("    (none yet — run `dayloop recap`)");
    }
    for summary in &summaries {
        println!(
            "    {:<11} generated {}",
            summary.tier,
            summary.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    let due = runtime.assistant.cascade().due_tiers(Utc::now()).await?;
    let due: Vec<_> = due.iter().map(|t| t.as_str()).collect();
    println!("\n  Due now:      {}", if due.is_empty() { "nothing".into() } else { due.join(", ") });

    let sessions = runtime.assistant.sessions().list().await?;
    println!("  Sessions:     {}", sessions.len());

    Ok(())
}
