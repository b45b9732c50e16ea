//! Ingest command - Merge a payload uploaded by a mobile device
//!
//! Loads the workforce snapshot, merges the payload with the configured
//! conflict policy and prints the report. With `--save` the merged store is
//! written back to `storage.snapshot_file`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use sitesync_conflict::{ConflictPolicy, IngestReport, MobileIngestor};
use sitesync_core::domain::MobileSyncPayload;
use tracing::info;

use super::{open_state_repo, open_store, CliContext};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct IngestCommand {
    /// JSON payload file
    pub file: PathBuf,

    /// Override `conflicts.strategy` (manual, newest_wins, remote_wins, keep_local)
    #[arg(long)]
    pub policy: Option<ConflictPolicy>,

    /// Write the merged store back to the snapshot file
    #[arg(long)]
    pub save: bool,
}

impl IngestCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config();

        let payload = read_payload(&self.file)?;
        let policy = self
            .policy
            .unwrap_or_else(|| ConflictPolicy::from_config(&config.conflicts.strategy));
        info!(
            file = %self.file.display(),
            device_id = %payload.device_id,
            policy = %policy,
            "Ingesting mobile payload"
        );

        let snapshot_path = config.storage.snapshot_file.clone();
        if self.save && snapshot_path.is_none() {
            formatter.error("--save needs storage.snapshot_file to be configured");
            return Ok(());
        }

        let store = open_store(&config)?;
        let (_pool, history) = open_state_repo(&config).await?;
        let ingestor = MobileIngestor::new(store.clone(), policy).with_history(history);
        let report = ingestor.ingest(&payload).await;

        let saved = match (&snapshot_path, self.save && report.applied > 0) {
            (Some(path), true) => {
                store.snapshot().save(path)?;
                info!(path = %path.display(), "Snapshot written");
                true
            }
            _ => false,
        };

        if ctx.is_json() {
            formatter.print_json(&json!({
                "deviceId": payload.device_id,
                "policy": policy.as_str(),
                "report": report,
                "saved": saved,
            }));
            return Ok(());
        }

        summarize(formatter.as_ref(), &report, policy);
        if saved {
            if let Some(path) = &snapshot_path {
                formatter.info(&format!("Snapshot written to {}", path.display()));
            }
        } else if report.applied > 0 && !self.save {
            formatter.info("Changes were not saved. Re-run with --save to keep them.");
        }
        Ok(())
    }
}

fn read_payload(path: &Path) -> Result<MobileSyncPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse payload {}", path.display()))
}

fn summarize(formatter: &dyn OutputFormatter, report: &IngestReport, policy: ConflictPolicy) {
    match &report.error {
        None => formatter.success(&format!(
            "Applied {} record{}",
            report.applied,
            plural(report.applied)
        )),
        Some(e) => formatter.error(&format!(
            "Ingestion stopped after {} record{}: {}",
            report.applied,
            plural(report.applied),
            e
        )),
    }

    formatter.info(&format!("Unchanged:         {}", report.unchanged));
    formatter.info(&format!("Skipped:           {}", report.skipped));
    formatter.info(&format!("Reference records: {}", report.reference_records));

    if report.conflicts.is_empty() {
        return;
    }

    formatter.info("");
    formatter.info(&format!(
        "{} conflict{} (policy: {}):",
        report.conflicts.len(),
        plural(report.conflicts.len()),
        policy
    ));
    for conflict in &report.conflicts {
        formatter.info(&format!(
            "  {} {} -> {}",
            conflict.entity_type(),
            conflict.entity_id(),
            conflict.resolution()
        ));
    }

    let pending = report.pending_review().count();
    if pending > 0 {
        formatter.warn(&format!(
            "{} conflict{} left for review",
            pending,
            plural(pending)
        ));
    }
}
