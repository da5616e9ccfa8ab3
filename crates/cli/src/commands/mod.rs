//! Subcommand implementations and the wiring they share.

pub mod cascade;
pub mod chat;
pub mod daemon;
pub mod onboard;
pub mod recap;
pub mod sessions;
pub mod status;

use dayloop_assistant::Assistant;
use dayloop_config::AppConfig;
use dayloop_core::records::UserRecords;
use dayloop_core::store::KvStore;
use dayloop_store::{FileStore, HttpStore, JsonRecordSource, SessionMergeStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs, built from the config file.
pub struct Runtime {
    pub config: AppConfig,
    pub assistant: Assistant,
    pub records: JsonRecordSource,
}

impl Runtime {
    /// Load config and wire the assistant.
    ///
    /// With `require_key`, a missing API key is reported with setup
    /// instructions instead of failing on the first request.
    pub fn bootstrap(require_key: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_config()?;
        if require_key && !config.has_api_key() && config.default_provider != "ollama" {
            print_key_help();
            return Err("No API key found. See above for setup instructions.".into());
        }

        let provider = dayloop_providers::build_from_config(&config);

        let local: Arc<dyn KvStore> = Arc::new(FileStore::new(config.local_store_path()));
        let remote: Option<Arc<dyn KvStore>> = config.storage.remote_url.as_ref().map(|url| {
            debug!(url = %url, "Remote session store configured");
            Arc::new(HttpStore::new(url, config.storage.remote_token.clone())) as Arc<dyn KvStore>
        });
        let sessions = SessionMergeStore::new(local.clone(), remote)
            .with_retention_days(config.storage.session_retention_days);

        let assistant = Assistant::new(&config, provider, local, sessions)?;
        let records = JsonRecordSource::new(config.records_path());

        Ok(Self {
            config,
            assistant,
            records,
        })
    }

    /// A fresh snapshot of the user's records.
    pub async fn records(&self) -> Result<UserRecords, Box<dyn std::error::Error>> {
        let records = UserRecords::load(&self.records)
            .await
            .map_err(|e| format!("Failed to load records from {}: {e}", self.config.records_path().display()))?;
        debug!(count = records.len(), "Records loaded");
        Ok(records)
    }
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// A token cancelled by the first Ctrl+C.
///
/// The watcher exits once the token is cancelled by anyone.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = trigger.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("Interrupted, cancelling");
                    trigger.cancel();
                }
            }
        }
    });
    cancel
}

/// Turn an assistant error into its user-facing message.
pub fn describe(error: &dayloop_core::Error) -> String {
    format!("{} ({error})", error.user_message())
}

fn print_key_help() {
    eprintln!();
    eprintln!("  No API key configured.");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
    eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
    eprintln!("    export DAYLOOP_API_KEY='sk-...'            (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}
