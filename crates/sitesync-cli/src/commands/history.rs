//! History command - Show recent syncs
//!
//! Reads the local history table by default; `--remote` asks the server for
//! the history it recorded instead.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use sitesync_core::domain::SyncHistoryEntry;
use sitesync_core::ports::ISyncStateRepository;
use sitesync_gateway::client::RequestGateway;

use super::{open_state_repo, token_store, CliContext};
use crate::output::format_duration_ms;

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of entries to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: u32,

    /// Fetch history from the server instead of the local database
    #[arg(long)]
    pub remote: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config();

        let entries = if self.remote {
            let gateway = RequestGateway::from_config(&config.server, token_store());
            match gateway.fetch_sync_history(self.limit).await {
                Ok(entries) => entries,
                Err(e) => {
                    formatter.error(&format!("Failed to fetch server history: {}", e));
                    return Ok(());
                }
            }
        } else {
            let (_pool, repo) = open_state_repo(&config).await?;
            repo.recent_history(self.limit)
                .await
                .context("Failed to read sync history")?
        };

        if ctx.is_json() {
            formatter.print_json(&json!({
                "source": if self.remote { "remote" } else { "local" },
                "entries": entries,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            formatter.info("No syncs recorded yet.");
            return Ok(());
        }

        formatter.info("Time                     Type         Status   Items  Duration  Device");
        formatter.info("------------------------ ------------ -------- ------ --------- ------");
        for entry in &entries {
            formatter.info(&format_row(entry));
        }

        Ok(())
    }
}

fn format_row(entry: &SyncHistoryEntry) -> String {
    format!(
        "{:<24} {:<12} {:<8} {:>6} {:>9}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        entry.sync_type.as_str(),
        entry.status.as_str(),
        entry.items_count,
        format_duration_ms(entry.duration),
        entry.device_id.as_deref().unwrap_or("-"),
    )
}
