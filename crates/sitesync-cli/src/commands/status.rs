//! Status command - Show sync and network status

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::json;

use super::{CliContext, SyncServices};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Skip the connectivity probe
    #[arg(long)]
    pub offline: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config();
        let services = SyncServices::build(&config).await?;

        if !self.offline {
            services.monitor.initialize().await;
        }

        let sync = services.orchestrator.get_sync_status();
        let network = services.monitor.get_network_status();
        let recommendation = services.monitor.get_sync_recommendation();
        let authenticated = services.gateway.has_access_token();

        if ctx.is_json() {
            formatter.print_json(&json!({
                "server": services.gateway.base_url(),
                "authenticated": authenticated,
                "sync": sync,
                "network": network,
                "recommendation": recommendation,
                "metrics": services.monitor.metrics(),
            }));
            return Ok(());
        }

        formatter.success("SiteSync status");
        formatter.info(&format!("Server:        {}", services.gateway.base_url()));
        formatter.info(&format!(
            "Credentials:   {}",
            if authenticated { "stored" } else { "missing" }
        ));
        formatter.info(&format!("Last sync:     {}", display_time(sync.last_sync)));
        formatter.info(&format!("Next sync:     {}", display_time(sync.next_sync)));

        if self.offline {
            formatter.info("Network:       not checked");
        } else if network.connected {
            formatter.info(&format!(
                "Network:       connected ({:?}, {})",
                network.link_type, network.quality
            ));
        } else {
            formatter.info("Network:       offline");
        }

        if !self.offline {
            if recommendation.should_sync {
                formatter.info(&format!("Recommendation: sync ({})", recommendation.reason));
            } else {
                formatter.warn(&format!("Sync not recommended: {}", recommendation.reason));
            }
        }

        if !authenticated {
            formatter.warn("No access token stored. Run 'sitesync auth set' first.");
        }

        Ok(())
    }
}

fn display_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}
