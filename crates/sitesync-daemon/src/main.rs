//! SiteSync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Periodic auto-sync of the workforce store to the admin server
//! - Connectivity monitoring, with a sync shortly after the link returns
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the adapters (keyring token store, HTTP gateway,
//! SQLite cursor repository, in-memory workforce store) into a
//! `SyncOrchestrator`, starts its background triggers, then waits on a
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::sync::Arc;

use anyhow::{Context, Result};
use sitesync_cache::DatabasePool;
use sitesync_core::clock::SystemClock;
use sitesync_core::config::Config;
use sitesync_core::memory::InMemoryWorkforceStore;
use sitesync_core::ports::{ISyncStateRepository, ITokenStore, IWorkforceStore};
use sitesync_gateway::auth::KeyringTokenStore;
use sitesync_gateway::client::RequestGateway;
use sitesync_gateway::transport::HealthProbe;
use sitesync_sync::change_set::ChangeSetFilter;
use sitesync_sync::network::{NetworkMonitor, QualityThresholds};
use sitesync_sync::orchestrator::{OrchestratorSettings, SyncOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the wired services for the lifetime of the process
struct DaemonService {
    config: Config,
    monitor: Arc<NetworkMonitor>,
    orchestrator: Arc<SyncOrchestrator>,
    /// Token for signalling graceful shutdown
    shutdown: CancellationToken,
    /// Keeps the SQLite pool open while the repository uses it
    _db_pool: DatabasePool,
}

impl DaemonService {
    /// Builds every adapter and the orchestrator from `config`
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        Self::with_token_store(config, Arc::new(KeyringTokenStore::default()), shutdown).await
    }

    async fn with_token_store(
        config: Config,
        tokens: Arc<dyn ITokenStore>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        match tokens.get() {
            Ok(Some(pair)) if pair.has_access_token() => info!("Access token found in keyring"),
            Ok(_) => warn!("No access token stored; syncs will fail until 'sitesync auth set' is run"),
            Err(e) => warn!(error = %format!("{e:#}"), "Could not read keyring"),
        }

        let gateway = Arc::new(RequestGateway::from_config(&config.server, tokens));
        info!(base_url = %gateway.base_url(), "Request gateway configured");

        let monitor = Arc::new(NetworkMonitor::new(
            Arc::new(HealthProbe::new(gateway.clone())),
            QualityThresholds::from_config(&config.network),
        ));

        let db_pool = DatabasePool::new(&config.storage.database)
            .await
            .context("Failed to open database")?;
        let state_repo: Arc<dyn ISyncStateRepository> = Arc::new(db_pool.state_repository());

        let store: Arc<dyn IWorkforceStore> = match &config.storage.snapshot_file {
            Some(path) => {
                let store = InMemoryWorkforceStore::load(path)
                    .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
                info!(path = %path.display(), "Workforce store seeded from snapshot");
                Arc::new(store)
            }
            None => {
                warn!("No storage.snapshot_file configured; workforce store starts empty");
                Arc::new(InMemoryWorkforceStore::new())
            }
        };

        let filter = ChangeSetFilter::from_config(store, Arc::new(SystemClock), &config.sync)?;
        let orchestrator = Arc::new(SyncOrchestrator::new(
            monitor.clone(),
            gateway,
            filter,
            state_repo,
            OrchestratorSettings::from_config(&config),
        ));

        Ok(Self {
            config,
            monitor,
            orchestrator,
            shutdown,
            _db_pool: db_pool,
        })
    }

    /// Starts background work and blocks until shutdown is requested
    ///
    /// 1. Restores the persisted cursor
    /// 2. Seeds and starts network monitoring
    /// 3. Attaches the reconnect listener and starts auto-sync
    /// 4. Runs one sync right away, then waits for the shutdown signal
    ///
    /// A shutdown signal during the initial sync abandons it.
    async fn run(&self) -> Result<()> {
        let cursor = self
            .orchestrator
            .restore_state()
            .await
            .context("Failed to restore sync cursor")?;
        info!(watermark = ?cursor.watermark, revision = ?cursor.revision, "Sync state restored");

        let status = self.monitor.initialize().await;
        self.monitor
            .start_monitoring(self.config.network.check_interval());
        info!(
            connected = status.connected,
            quality = %status.quality,
            check_interval_secs = self.config.network.check_interval_secs,
            "Network monitoring started"
        );

        self.orchestrator.attach_network_listener();
        self.orchestrator.start_auto_sync();

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("Shutdown signal received during initial sync");
            }
            outcome = self.orchestrator.trigger_sync() => {
                match &outcome.error {
                    None => info!(records = outcome.records_sent, "Initial sync completed"),
                    Some(err) => warn!(kind = %err.kind, reason = %err.message, "Initial sync did not complete"),
                }
                self.shutdown.cancelled().await;
                info!("Shutdown signal received");
            }
        }

        self.orchestrator.shutdown();
        self.monitor.stop_monitoring();
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);
    init_tracing(&config.logging.level);

    info!(config_path = %config_path.display(), "SiteSync daemon starting (sitesyncd)");
    for issue in config.validate() {
        warn!(field = %issue.field, "{}", issue.message);
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("SiteSync daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "SiteSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
