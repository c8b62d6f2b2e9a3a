//! Portal configuration
//!
//! Loaded from a TOML file (defaults when the file is absent), then
//! overridden from the environment the way the portal is deployed.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::progress::MODULES;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub api_keys: ApiKeysConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the portal listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Cloud project the range is deployed into
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Cloud region
    #[serde(default = "default_region")]
    pub region: String,
}

/// Where unlock progress is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBackend {
    /// Marker files on disk
    #[default]
    File,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default)]
    pub backend: ProgressBackend,

    /// Directory holding unlock markers
    #[serde(default = "default_progress_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// Ordered secrets; entry k unlocks module k+1
    #[serde(default = "default_secrets")]
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Monitoring function endpoint. Unset means not deployed.
    #[serde(default)]
    pub monitoring_function_url: Option<String>,

    /// Upstream call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Identity token presented to the monitoring function
    #[serde(default)]
    pub identity_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_admin_key")]
    pub admin_key: String,
}

/// Metadata relay (the monitoring function) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_listen")]
    pub listen: SocketAddr,

    /// Base URL of the service-account metadata tree
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Defaults
fn default_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8080)) }
fn default_monitor_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8081)) }
fn default_project_id() -> String { "your-project-id".to_string() }
fn default_region() -> String { "us-east1".to_string() }
fn default_progress_dir() -> PathBuf { PathBuf::from("/tmp/flag_progress") }
fn default_timeout_secs() -> u64 { 5 }
fn default_api_key() -> String { "dev-key-12345".to_string() }
fn default_admin_key() -> String { "admin-secret-key".to_string() }
fn default_metadata_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default"
        .to_string()
}
fn default_secrets() -> Vec<String> {
    vec![
        "flag{nope-not-here}".to_string(),
        "flag{nice-try}".to_string(),
        "flag{im-sadge-you-got-to-this-point}".to_string(),
        "flag{ask-for-a-hint-cmon-:p}".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            project_id: default_project_id(),
            region: default_region(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            backend: ProgressBackend::default(),
            dir: default_progress_dir(),
        }
    }
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self { secrets: default_secrets() }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            monitoring_function_url: None,
            timeout_secs: default_timeout_secs(),
            identity_token: None,
        }
    }
}

impl Default for ApiKeysConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            admin_key: default_admin_key(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            listen: default_monitor_listen(),
            metadata_url: default_metadata_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BrokerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MonitorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply deployment environment variables.
    ///
    /// `FLAG1`..`FLAGn` replace the secret at that position.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env`] with an explicit lookup
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project_id) = lookup("PROJECT_ID") {
            self.server.project_id = project_id;
        }
        if let Some(region) = lookup("REGION") {
            self.server.region = region;
        }
        if let Some(dir) = lookup("PROGRESS_DIR") {
            self.progress.dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("MONITORING_FUNCTION_URL").filter(|u| !u.is_empty()) {
            self.broker.monitoring_function_url = Some(url);
        }
        if let Some(token) = lookup("IDENTITY_TOKEN").filter(|t| !t.is_empty()) {
            self.broker.identity_token = Some(token);
        }
        if let Some(key) = lookup("CLOUDAI_API_KEY") {
            self.api_keys.api_key = key;
        }
        if let Some(key) = lookup("CLOUDAI_ADMIN_KEY") {
            self.api_keys.admin_key = key;
        }
        for (i, secret) in self.flags.secrets.iter_mut().enumerate() {
            if let Some(value) = lookup(&format!("FLAG{}", i + 1)) {
                *secret = value;
            }
        }
    }

    /// Check invariants the portal relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = MODULES.len() - 1;
        if self.flags.secrets.len() != expected {
            return Err(ConfigError::Invalid(format!(
                "expected {} flags, got {}",
                expected,
                self.flags.secrets.len()
            )));
        }
        if self.flags.secrets.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("flags must not be empty".to_string()));
        }
        if self.broker.timeout_secs == 0 || self.monitor.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
