//! Client configuration
//!
//! Resolution order, highest first:
//! 1. Explicit overrides (CLI flags)
//! 2. Environment variables (`MEETMIND_*`)
//! 3. TOML file (`<config_dir>/meetmind/config.toml`)
//! 4. Compiled defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "MEETMIND_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "MEETMIND_POLL_INTERVAL_MS";
pub const ENV_TOKEN: &str = "MEETMIND_TOKEN";

/// Connection and polling settings shared by every view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Substring that marks a not-found detail as a terminal job failure
    pub failure_keyword: String,
    pub media_base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            poll_interval_ms: 3000,
            failure_keyword: "failed".to_string(),
            media_base_url: None,
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Load defaults, then the config file (if any), then the environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file; unknown keys are ignored, missing keys use defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ClientConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::info!("Loaded client config from {}", path.display());
        Ok(config)
    }

    /// Overlay `MEETMIND_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(raw) = std::env::var(ENV_POLL_INTERVAL_MS) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => log::warn!("Ignoring invalid {}={}", ENV_POLL_INTERVAL_MS, raw),
            }
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// API root without a trailing slash
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Resolve a server-relative media path (`/media/<file>`) to a full URL
    pub fn resolve_media_url(&self, media_path: &str) -> String {
        if media_path.starts_with("http://") || media_path.starts_with("https://") {
            return media_path.to_string();
        }
        let root = self
            .media_base_url
            .as_deref()
            .unwrap_or(&self.base_url)
            .trim_end_matches('/');
        format!("{}/{}", root, media_path.trim_start_matches('/'))
    }
}

/// `<config_dir>/meetmind/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("meetmind").join("config.toml"))
}
