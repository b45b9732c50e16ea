//! CLI subcommands and the adapter wiring they share

pub mod auth;
pub mod completions;
pub mod config;
pub mod history;
pub mod ingest;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sitesync_cache::DatabasePool;
use sitesync_core::clock::SystemClock;
use sitesync_core::config::Config;
use sitesync_core::memory::InMemoryWorkforceStore;
use sitesync_core::ports::{ISyncStateRepository, ITokenStore};
use sitesync_gateway::auth::KeyringTokenStore;
use sitesync_gateway::client::RequestGateway;
use sitesync_gateway::transport::HealthProbe;
use sitesync_sync::change_set::ChangeSetFilter;
use sitesync_sync::network::{NetworkMonitor, QualityThresholds};
use sitesync_sync::orchestrator::{OrchestratorSettings, SyncOrchestrator};
use tracing::{debug, info};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
    pub quiet: bool,
}

impl CliContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Loads the config file, falling back to defaults when it is missing
    pub fn load_config(&self) -> Config {
        let config = Config::load_or_default(&self.config_path);
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        config
    }
}

/// Opens the SQLite database holding the cursor and local history
///
/// The pool is returned alongside the repository so the caller keeps it open.
pub(crate) async fn open_state_repo(
    config: &Config,
) -> Result<(DatabasePool, Arc<dyn ISyncStateRepository>)> {
    let pool = DatabasePool::new(&config.storage.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open database {}",
                config.storage.database.display()
            )
        })?;
    let repo: Arc<dyn ISyncStateRepository> = Arc::new(pool.state_repository());
    Ok((pool, repo))
}

/// Loads the workforce store from `storage.snapshot_file`, or starts empty
pub(crate) fn open_store(config: &Config) -> Result<Arc<InMemoryWorkforceStore>> {
    match &config.storage.snapshot_file {
        Some(path) => {
            let store = InMemoryWorkforceStore::load(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            debug!(path = %path.display(), "Workforce store loaded from snapshot");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryWorkforceStore::new())),
    }
}

pub(crate) fn token_store() -> Arc<dyn ITokenStore> {
    Arc::new(KeyringTokenStore::default())
}

/// Everything a sync or status command talks to
pub(crate) struct SyncServices {
    pub gateway: Arc<RequestGateway>,
    pub monitor: Arc<NetworkMonitor>,
    pub orchestrator: Arc<SyncOrchestrator>,
    _pool: DatabasePool,
}

impl SyncServices {
    /// Wires the same adapters the daemon uses, without background tasks
    pub async fn build(config: &Config) -> Result<Self> {
        let gateway = Arc::new(RequestGateway::from_config(&config.server, token_store()));
        let monitor = Arc::new(NetworkMonitor::new(
            Arc::new(HealthProbe::new(gateway.clone())),
            QualityThresholds::from_config(&config.network),
        ));
        let (pool, state_repo) = open_state_repo(config).await?;
        let store = open_store(config)?;
        let filter = ChangeSetFilter::from_config(store, Arc::new(SystemClock), &config.sync)?;

        let orchestrator = Arc::new(SyncOrchestrator::new(
            monitor.clone(),
            gateway.clone(),
            filter,
            state_repo,
            OrchestratorSettings::from_config(config),
        ));
        orchestrator
            .restore_state()
            .await
            .context("Failed to restore sync cursor")?;

        Ok(Self {
            gateway,
            monitor,
            orchestrator,
            _pool: pool,
        })
    }
}
