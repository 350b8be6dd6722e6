use std::time::Duration;

use thiserror::Error;

use crate::sync::gateway::Endpoint;

pub const API_URL_VAR: &str = "EVENTBOARD_API_URL";
pub const TIMEOUT_MS_VAR: &str = "EVENTBOARD_TIMEOUT_MS";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the resource API lives and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("EVENTBOARD_TIMEOUT_MS must be a positive whole number of milliseconds, got {0:?}")]
    InvalidTimeout(String),
    #[error("API base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_URL.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::default().with_base_url(base_url)
    }

    /// Reads the configuration from the process environment, falling back to
    /// the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_VAR).filter(|url| !url.trim().is_empty()) {
            config = config.with_base_url(url)?;
        }
        if let Some(raw) = lookup(TIMEOUT_MS_VAR) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}
