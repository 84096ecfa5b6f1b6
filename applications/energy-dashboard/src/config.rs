use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `backend.base_url`
pub const BACKEND_URL_ENV: &str = "BACKEND_API_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// No client-side timeout when unset; the transport default applies.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_anomaly_limit")]
    pub anomaly_limit: u32,
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
    #[serde(default = "default_retained_alerts")]
    pub retained_alerts: usize,
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,
}

fn default_grace_period_ms() -> u64 {
    3000
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_anomaly_limit() -> u32 {
    20
}

fn default_max_alerts() -> usize {
    10
}

fn default_retained_alerts() -> usize {
    50
}

fn default_history_hours() -> u32 {
    24
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            anomaly_limit: default_anomaly_limit(),
            max_alerts: default_max_alerts(),
            retained_alerts: default_retained_alerts(),
            history_hours: default_history_hours(),
        }
    }
}

impl DashboardConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".into()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Like [`Config::load`], but falls back to built-in defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }

        tracing::info!(
            "No config file at {}, using defaults",
            path.as_ref().display()
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text, expanding $(VAR_NAME) placeholders first
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let mut config: Config = serde_yaml::from_str(&expanded)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.base_url = url;
            }
        }

        self.backend.base_url = self.backend.base_url.trim().trim_end_matches('/').to_string();
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.backend.base_url.is_empty() {
            return Err(AppError::Config(
                "Backend base_url cannot be empty".to_string(),
            ));
        }

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "Backend base_url must start with http:// or https://, got {}",
                self.backend.base_url
            )));
        }

        if self.dashboard.grace_period_ms == 0 {
            return Err(AppError::Config(
                "Dashboard grace_period_ms cannot be 0".to_string(),
            ));
        }

        if self.dashboard.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "Dashboard poll_interval_ms cannot be 0".to_string(),
            ));
        }

        if self.dashboard.history_hours == 0 {
            return Err(AppError::Config(
                "Dashboard history_hours cannot be 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)")
        .map_err(|e| AppError::Config(e.to_string()))?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}
