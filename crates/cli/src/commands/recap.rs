//! `dayloop recap`: The opening recap.

use chrono::Utc;

use super::{CommandResult, Runtime, cancel_on_ctrl_c, describe};

pub async fn run(force: bool) -> CommandResult {
    let runtime = Runtime::bootstrap(true)?;
    let records = runtime.records().await?;
    let cancel = cancel_on_ctrl_c();
    let now = Utc::now();

    let result = if force {
        runtime
            .assistant
            .generate_daily_recap(&records, now, &cancel)
            .await
    } else {
        runtime.assistant.opening_recap(&records, now, &cancel).await
    };

    match result {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => Err(describe(&e).into()),
    }
}
