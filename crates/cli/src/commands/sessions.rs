//! `dayloop sessions`: List, show, delete or prune chat sessions.

use chrono::Utc;
use clap::Subcommand;
use dayloop_core::session::SessionId;

use super::{CommandResult, Runtime};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List sessions, newest first
    List,

    /// Print one session's messages
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session from every store
    Delete {
        /// Session id
        id: String,
    },

    /// Drop local sessions older than the retention window
    Prune,
}

pub async fn run(action: SessionAction) -> CommandResult {
    let runtime = Runtime::bootstrap(false)?;
    let sessions = runtime.assistant.sessions();

    match action {
        SessionAction::List => {
            let all = sessions.list().await?;
            if all.is_empty() {
                println!("No sessions yet.");
            }
            for session in &all {
                println!(
                    "  {}  {}  {:>3} messages  last active {}",
                    session.id,
                    session.date,
                    session.messages.len(),
                    session.recency().format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        SessionAction::Show { id } => match sessions.get(&SessionId::from(id.as_str())).await? {
            Some(session) => {
                println!("Session {} ({})\n", session.id, session.date);
                for message in &session.messages {
                    println!("[{:?}] {}\n", message.role, message.content);
                }
            }
            None => println!("No session with id {id}"),
        },
        SessionAction::Delete { id } => {
            if sessions.delete(&SessionId::from(id.as_str())).await? {
                println!("Deleted session {id}");
            } else {
                println!("No session with id {id}");
            }
        }
        SessionAction::Prune => {
            let removed = sessions.prune_local(Utc::now().date_naive()).await?;
            println!("Pruned {removed} local session(s)");
        }
    }

    Ok(())
}
