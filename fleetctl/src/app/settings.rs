//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use crate::errors::FleetError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::Environment;

/// Environment variable naming the settings file
pub const CONFIG_ENV: &str = "FLEETCTL_CONFIG";

/// fleetctl settings
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Control plane configuration
    #[serde(default)]
    pub control_plane: ControlPlaneSettings,

    /// Deployment history configuration
    #[serde(default)]
    pub history: HistorySettings,

    /// Rolling refresh configuration
    #[serde(default)]
    pub refresh: RefreshSettings,

    /// Post-refresh target health verification
    #[serde(default)]
    pub fleet_health: FleetHealthSettings,

    /// Resource naming
    #[serde(default)]
    pub naming: NamingSettings,
}

impl Settings {
    /// Read settings from `path`, or use the defaults when no path is given
    pub async fn load(path: Option<&Path>) -> Result<Self, FleetError> {
        let Some(path) = path else {
            debug!("No settings file given, using defaults");
            return Ok(Self::default());
        };

        let file = File::new(path);
        if !file.exists().await {
            return Err(FleetError::ConfigError(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }
        file.read_json().await
    }
}

/// Control plane settings
#[derive(Debug, Deserialize)]
pub struct ControlPlaneSettings {
    /// Base URL of the control plane API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<SecretString>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl ControlPlaneSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ControlPlaneSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where deployment records are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// Local directory
    #[default]
    File,
    /// Control plane object API
    Http,
}

/// Deployment history settings
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    #[serde(default)]
    pub backend: HistoryBackend,

    /// Root directory of the file backend
    #[serde(default = "default_history_root")]
    pub root_dir: PathBuf,

    /// Records scanned when looking for a rollback target
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Bucket name suffix; buckets are named `<env><suffix>`
    #[serde(default = "default_bucket_suffix")]
    pub bucket_suffix: String,
}

fn default_history_root() -> PathBuf {
    PathBuf::from(".fleetctl/history")
}

fn default_search_limit() -> usize {
    crate::history::store::DEFAULT_SEARCH_LIMIT
}

fn default_bucket_suffix() -> String {
    "-devops-artifacts".to_string()
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::default(),
            root_dir: default_history_root(),
            search_limit: default_search_limit(),
            bucket_suffix: default_bucket_suffix(),
        }
    }
}

/// Rolling refresh settings
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_min_healthy_percent")]
    pub min_healthy_percent: u8,

    #[serde(default = "default_warmup")]
    pub warmup_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up waiting for a refresh after this long
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
}

fn default_min_healthy_percent() -> u8 {
    50
}

fn default_warmup() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_poll_errors() -> u32 {
    5
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            min_healthy_percent: default_min_healthy_percent(),
            warmup_secs: default_warmup(),
            poll_interval_secs: default_poll_interval(),
            deadline_secs: None,
            max_poll_errors: default_max_poll_errors(),
        }
    }
}

/// Target health verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct FleetHealthSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
}

fn default_max_attempts() -> u32 {
    20
}

fn default_health_interval() -> u64 {
    15
}

impl Default for FleetHealthSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_health_interval(),
        }
    }
}

/// Resource naming settings
#[derive(Debug, Clone, Deserialize)]
pub struct NamingSettings {
    #[serde(default = "default_fleet_suffix")]
    pub fleet_suffix: String,

    #[serde(default = "default_target_group_suffix")]
    pub target_group_suffix: String,
}

fn default_fleet_suffix() -> String {
    "-asg".to_string()
}

fn default_target_group_suffix() -> String {
    "-tg".to_string()
}

impl NamingSettings {
    pub fn fleet_name(&self, environment: Environment) -> String {
        format!("{}{}", environment, self.fleet_suffix)
    }

    pub fn target_group(&self, environment: Environment) -> String {
        format!("{}{}", environment, self.target_group_suffix)
    }
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            fleet_suffix: default_fleet_suffix(),
            target_group_suffix: default_target_group_suffix(),
        }
    }
}
