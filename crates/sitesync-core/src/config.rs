//! Configuration module for SiteSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for SiteSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub network: NetworkConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

/// Remote administration server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Timeout of the unauthenticated health probe in seconds.
    pub health_timeout_secs: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between automatic sync attempts.
    pub interval_secs: u64,
    /// Quiet period in milliseconds before a burst of change notifications
    /// turns into one sync.
    pub debounce_ms: u64,
    /// Base retry delay in milliseconds; attempt `n` waits `n` times this.
    pub retry_delay_ms: u64,
    /// Maximum attempts per sync, including the first.
    pub max_attempts: u32,
    /// Lookback window in seconds for the `lookback` change-tracking strategy.
    pub lookback_secs: u64,
    /// Change tracking strategy: `lookback` or `revision`.
    pub change_tracking: String,
    /// Identifier sent along with pushed change sets.
    pub device_id: Option<String>,
}

/// Network monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Seconds between background connectivity probes.
    pub check_interval_secs: u64,
    /// Delay in milliseconds before syncing after the link comes back.
    pub reconnect_delay_ms: u64,
    /// Probes faster than this are `excellent`.
    pub excellent_latency_ms: u64,
    /// Probes faster than this (but not excellent) are `good`; slower ones are `poor`.
    pub good_latency_ms: u64,
}

/// Inbound conflict handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Strategy: `manual`, `newest_wins`, `remote_wins`, or `keep_local`.
    pub strategy: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Local storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the sync cursor and local history.
    pub database: PathBuf,
    /// JSON snapshot used to seed the in-memory workforce store.
    pub snapshot_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/sitesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sitesync")
            .join("config.yaml")
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }
}

impl NetworkConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 30,
            health_timeout_secs: 5,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            debounce_ms: 1000,
            retry_delay_ms: 5000,
            max_attempts: 3,
            lookback_secs: 3600,
            change_tracking: "lookback".to_string(),
            device_id: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            reconnect_delay_ms: 2000,
            excellent_latency_ms: 300,
            good_latency_ms: 1000,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            strategy: "manual".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("sitesync");
        Self {
            database: data_dir.join("sitesync.db"),
            snapshot_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.strategy`.
pub const VALID_CONFLICT_STRATEGIES: &[&str] =
    &["manual", "newest_wins", "remote_wins", "keep_local"];

/// Valid values for `sync.change_tracking`.
pub const VALID_CHANGE_TRACKING: &[&str] = &["lookback", "revision"];

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn must_be_one_of(
    errors: &mut Vec<ValidationError>,
    field: &str,
    what: &str,
    value: &str,
    valid: &[&str],
) {
    if !valid.contains(&value) {
        errors.push(ValidationError {
            field: field.into(),
            message: format!(
                "invalid {what} '{value}'; valid options: {}",
                valid.join(", ")
            ),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        let base_url = self.server.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "server.base_url".into(),
                message: format!("must be an http(s) URL, got '{base_url}'"),
            });
        }
        must_be_positive(
            &mut errors,
            "server.request_timeout_secs",
            self.server.request_timeout_secs,
        );
        must_be_positive(
            &mut errors,
            "server.health_timeout_secs",
            self.server.health_timeout_secs,
        );
        if self.server.health_timeout_secs > self.server.request_timeout_secs {
            errors.push(ValidationError {
                field: "server.health_timeout_secs".into(),
                message: format!(
                    "health_timeout_secs ({}) must not exceed request_timeout_secs ({})",
                    self.server.health_timeout_secs, self.server.request_timeout_secs
                ),
            });
        }

        // --- sync ---
        must_be_positive(&mut errors, "sync.interval_secs", self.sync.interval_secs);
        must_be_positive(&mut errors, "sync.debounce_ms", self.sync.debounce_ms);
        must_be_positive(
            &mut errors,
            "sync.max_attempts",
            u64::from(self.sync.max_attempts),
        );
        must_be_positive(&mut errors, "sync.lookback_secs", self.sync.lookback_secs);
        must_be_one_of(
            &mut errors,
            "sync.change_tracking",
            "strategy",
            &self.sync.change_tracking,
            VALID_CHANGE_TRACKING,
        );
        if let Some(device_id) = &self.sync.device_id {
            if device_id.trim().is_empty() {
                errors.push(ValidationError {
                    field: "sync.device_id".into(),
                    message: "must not be blank when set".into(),
                });
            }
        }

        // --- network ---
        must_be_positive(
            &mut errors,
            "network.check_interval_secs",
            self.network.check_interval_secs,
        );
        must_be_positive(
            &mut errors,
            "network.excellent_latency_ms",
            self.network.excellent_latency_ms,
        );
        if self.network.good_latency_ms <= self.network.excellent_latency_ms {
            errors.push(ValidationError {
                field: "network.good_latency_ms".into(),
                message: format!(
                    "good_latency_ms ({}) must exceed excellent_latency_ms ({})",
                    self.network.good_latency_ms, self.network.excellent_latency_ms
                ),
            });
        }

        // --- conflicts ---
        must_be_one_of(
            &mut errors,
            "conflicts.strategy",
            "strategy",
            &self.conflicts.strategy,
            VALID_CONFLICT_STRATEGIES,
        );

        // --- logging ---
        must_be_one_of(
            &mut errors,
            "logging.level",
            "level",
            &self.logging.level,
            VALID_LOG_LEVELS,
        );

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use sitesync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_base_url("https://admin.example.com/api")
///     .sync_interval_secs(120)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.base_url = url.into();
        self
    }

    pub fn server_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.request_timeout_secs = seconds;
        self
    }

    pub fn server_health_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.health_timeout_secs = seconds;
        self
    }

    // --- sync ---

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_ms = ms;
        self
    }

    pub fn sync_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.retry_delay_ms = ms;
        self
    }

    pub fn sync_max_attempts(mut self, n: u32) -> Self {
        self.config.sync.max_attempts = n;
        self
    }

    pub fn sync_lookback_secs(mut self, seconds: u64) -> Self {
        self.config.sync.lookback_secs = seconds;
        self
    }

    pub fn sync_change_tracking(mut self, strategy: impl Into<String>) -> Self {
        self.config.sync.change_tracking = strategy.into();
        self
    }

    pub fn sync_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.config.sync.device_id = Some(device_id.into());
        self
    }

    // --- network ---

    pub fn network_check_interval_secs(mut self, seconds: u64) -> Self {
        self.config.network.check_interval_secs = seconds;
        self
    }

    pub fn network_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.network.reconnect_delay_ms = ms;
        self
    }

    pub fn network_latency_thresholds_ms(mut self, excellent: u64, good: u64) -> Self {
        self.config.network.excellent_latency_ms = excellent;
        self.config.network.good_latency_ms = good;
        self
    }

    // --- conflicts ---

    pub fn conflicts_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.strategy = strategy.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    pub fn storage_snapshot_file(mut self, path: PathBuf) -> Self {
        self.config.storage.snapshot_file = Some(path);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
