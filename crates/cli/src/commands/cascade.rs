//! `dayloop cascade`: Run due summary tiers, or force one.

use chrono::Utc;
use dayloop_assistant::TierStatus;
use dayloop_core::summary::Tier;

use super::{CommandResult, Runtime, cancel_on_ctrl_c, describe};

pub async fn run(tier: Option<Tier>, force: bool) -> CommandResult {
    let runtime = Runtime::bootstrap(true)?;
    let records = runtime.records().await?;
    let cancel = cancel_on_ctrl_c();
    let now = Utc::now();
    let cascade = runtime.assistant.cascade();

    match (tier, force) {
        (Some(tier), true) => {
            let summary = cascade
                .regenerate(tier, &records, now, &cancel)
                .await
                .map_err(|e| describe(&e))?;
            println!("[{tier}] regenerated\n\n{}", summary.content);
        }
        (Some(tier), false) => {
            match cascade
                .run_tier(tier, &records, now, &cancel)
                .await
                .map_err(|e| describe(&e))?
            {
                Some(summary) => println!("[{tier}] regenerated\n\n{}", summary.content),
                None => println!("[{tier}] not due"),
            }
        }
        (None, _) => {
            let report = runtime
                .assistant
                .run_due_cascades(&records, now, &cancel)
                .await
                .map_err(|e| describe(&e))?;
            for outcome in &report.outcomes {
                match &outcome.status {
                    TierStatus::NotDue => println!("  {:<11} not due", outcome.tier),
                    TierStatus::Regenerated(_) => println!("  {:<11} regenerated", outcome.tier),
                    TierStatus::Failed(e) => println!("  {:<11} failed: {e}", outcome.tier),
                }
            }
        }
    }

    Ok(())
}
