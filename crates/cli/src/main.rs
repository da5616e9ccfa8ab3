//! Dayloop CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Initialize config and data files
//! - `chat`     : Interactive chat or single-message mode
//! - `recap`    : Print today's opening recap
//! - `cascade`  : Run due summary tiers, or force one
//! - `daemon`   : Run due cascades on a timer
//! - `status`   : Show configuration and summary state
//! - `sessions` : List, show, delete or prune chat sessions

use clap::{Parser, Subcommand};
use dayloop_core::summary::Tier;

mod commands;

#[derive(Parser)]
#[command(
    name = "dayloop",
    about = "Dayloop — personal analytics assistant and summary cascade",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data files
    Onboard,

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the opening recap, running any due summaries first
    Recap {
        /// Regenerate the daily recap even if one exists for today
        #[arg(short, long)]
        force: bool,
    },

    /// Run due summary tiers
    Cascade {
        /// Only this tier (daily, weekly, monthly, quarterly, semi-annual, annual)
        #[arg(short, long)]
        tier: Option<Tier>,

        /// Regenerate even when not due (requires --tier)
        #[arg(short, long, requires = "tier")]
        force: bool,
    },

    /// Check for due summaries on a timer until interrupted
    Daemon {
        /// Override the check interval in minutes
        #[arg(short, long)]
        interval: Option<u32>,
    },

    /// Show configuration and summary state
    Status,

    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        action: commands::sessions::SessionAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Recap { force } => commands::recap::run(force).await?,
        Commands::Cascade { tier, force } => commands::cascade::run(tier, force).await?,
        Commands::Daemon { interval } => commands::daemon::run(interval).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Sessions { action } => commands::sessions::run(action).await?,
    }

    Ok(())
}
