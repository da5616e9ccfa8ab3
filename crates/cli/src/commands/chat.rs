//! `dayloop chat`: Chat with the assistant.
//!
//! Every exchange lands in today's session, so an interactive run and a
//! later `--message` call share history.

use chrono::Utc;
use std::io::{BufRead, Write};

use super::{CommandResult, Runtime, cancel_on_ctrl_c, describe};

pub async fn run(message: Option<String>) -> CommandResult {
    let runtime = Runtime::bootstrap(true)?;

    if let Some(msg) = message {
        let records = runtime.records().await?;
        let cancel = cancel_on_ctrl_c();
        let reply = runtime
            .assistant
            .chat(&msg, &records, Utc::now(), &cancel)
            .await
            .map_err(|e| describe(&e))?;
        println!("{}", reply.reply);
        return Ok(());
    }

    println!("Dayloop Chat");
    println!(
        "   Models: {} (deep) / {} (quick)",
        runtime.config.models.deep, runtime.config.models.quick
    );
    println!("   Type 'exit' or Ctrl+D to quit. Ctrl+C cancels a pending reply.\n");

    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        // Records are re-read every turn so edits made meanwhile show up.
        let records = match runtime.records().await {
            Ok(records) => records,
            Err(e) => {
                eprintln!("\n  {e}\n");
                continue;
            }
        };

        let cancel = cancel_on_ctrl_c();
        match runtime
            .assistant
            .chat(input, &records, Utc::now(), &cancel)
            .await
        {
            Ok(reply) => println!("\nDayloop: {}\n", reply.reply),
            Err(e) if e.is_cancelled() => println!("\n  (cancelled)\n"),
            Err(e) => eprintln!("\n  {}\n", describe(&e)),
        }
        cancel.cancel();
    }

    Ok(())
}
