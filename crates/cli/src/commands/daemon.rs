//! `dayloop daemon`: Run due cascades on a timer.
//!
//! The assistant has no timers of its own; this loop is the clock.

use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

use super::{CommandResult, Runtime};

pub async fn run(interval: Option<u32>) -> CommandResult {
    let runtime = Runtime::bootstrap(true)?;
    let minutes = interval
        .unwrap_or(runtime.config.cascade.check_interval_minutes)
        .max(1);

    println!("Dayloop Daemon — checking for due summaries every {minutes} min");
    println!("   Press Ctrl+C to stop.");

    let cancel = tokio_util::sync::CancellationToken::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(u64::from(minutes) * 60));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                info!("Daemon stopping");
                break;
            }
            _ = ticker.tick() => {
                let records = match runtime.records().await {
                    Ok(records) => records,
                    Err(e) => {
                        warn!(error = %e, "Skipping cascade check");
                        continue;
                    }
                };
                match runtime.assistant.run_due_cascades(&records, Utc::now(), &cancel).await {
                    Ok(report) => info!(
                        regenerated = ?report.regenerated(),
                        failed = ?report.failed(),
                        "Cascade check complete"
                    ),
                    Err(e) => warn!(error = %e, "Cascade check aborted"),
                }
            }
        }
    }

    Ok(())
}
