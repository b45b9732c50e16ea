//! Sync command - Push local changes to the administration server
//!
//! Provides the `sitesync sync` CLI command which:
//! 1. Loads configuration, the workforce snapshot and the persisted cursor
//! 2. Probes connectivity once
//! 3. Runs one sync (or a full resync with `--full`) through the orchestrator
//! 4. Displays the outcome, exiting non-zero when the sync failed

use anyhow::Result;
use clap::Args;
use serde_json::json;
use sitesync_sync::SyncOutcome;
use tracing::info;

use super::{CliContext, SyncServices};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Discard the cursor and send every record
    #[arg(long)]
    pub full: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config();
        let services = SyncServices::build(&config).await?;

        let network = services.monitor.initialize().await;
        formatter.info(&format!(
            "Server: {} ({})",
            services.gateway.base_url(),
            if network.connected {
                network.quality.to_string()
            } else {
                "unreachable".to_string()
            }
        ));

        let outcome = if self.full {
            info!("Full resync requested");
            formatter.info("Full resync requested - cursor cleared");
            services.orchestrator.force_full_sync().await
        } else {
            services.orchestrator.trigger_sync().await
        };

        if ctx.is_json() {
            let status = services.orchestrator.get_sync_status();
            formatter.print_json(&json!({
                "outcome": outcome,
                "status": status,
            }));
        } else {
            report(formatter.as_ref(), &outcome);
        }
        into_result(&outcome)
    }
}

fn into_result(outcome: &SyncOutcome) -> Result<()> {
    match &outcome.error {
        None => Ok(()),
        Some(err) => anyhow::bail!("sync failed ({}): {}", err.kind, err.message),
    }
}

fn report(formatter: &dyn OutputFormatter, outcome: &SyncOutcome) {
    match &outcome.error {
        None if outcome.records_sent == 0 => formatter.success("Already up to date"),
        None => formatter.success(&format!(
            "Sent {} record{}",
            outcome.records_sent,
            plural(outcome.records_sent)
        )),
        Some(err) => {
            formatter.error(&format!("Sync failed ({}): {}", err.kind, err.message));
            if err.kind.is_preflight() {
                formatter.info("No request was sent to the server.");
            }
        }
    }

    if outcome.attempts > 1 {
        formatter.info(&format!("Attempts: {}", outcome.attempts));
    }
}
