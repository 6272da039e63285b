//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! API location, request timeout, page size, which session backend to use
//! and the last username entered.
//!
//! Configuration is stored at `~/.config/blogdesk/config.json`. The
//! `BLOGDESK_API_URL` and `BLOGDESK_SESSION_BACKEND` environment variables
//! override the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, ReqwestTransport, DEFAULT_PAGE_SIZE};
use crate::auth::{AuthService, FileSessionStore, KeyringSessionStore, SessionStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "blogdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

/// HTTP request timeout in seconds.
/// Requests that take longer fail with a timeout error and are not retried.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "BLOGDESK_API_URL";
const ENV_SESSION_BACKEND: &str = "BLOGDESK_SESSION_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(SessionBackend::File),
            "keyring" | "keychain" => Ok(SessionBackend::Keyring),
            other => Err(anyhow::anyhow!("Unknown session backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub session_backend: SessionBackend,
    /// Relative path to POST the refresh token to on logout, if the backend has one
    pub logout_path: Option<String>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            session_backend: SessionBackend::default(),
            logout_path: None,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from disk (defaults if absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = url.trim().to_string();
        }
        if let Some(backend) = lookup(ENV_SESSION_BACKEND).filter(|v| !v.trim().is_empty()) {
            self.session_backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_SESSION_BACKEND))?;
        }
        Ok(())
    }

    /// Parsed base URL, always ending in `/`.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).with_context(|| format!("Invalid API base URL: {}", raw))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot carry a path: {}", raw);
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        Ok(match self.session_backend {
            SessionBackend::File => Arc::new(FileSessionStore::new(&self.data_dir()?)),
            SessionBackend::Keyring => {
                let url = self.base_url()?;
                let account = url.host_str().unwrap_or("session").to_string();
                Arc::new(KeyringSessionStore::for_account(&account))
            }
        })
    }

    /// Build an `ApiClient` with the configured transport and session store.
    pub fn build_client(&self) -> Result<ApiClient> {
        let transport = ReqwestTransport::new(self.base_url()?, self.request_timeout())
            .context("Failed to build HTTP client")?;
        let client = ApiClient::new(Arc::new(transport), self.session_store()?)
            .with_page_size(self.page_size);
        Ok(client)
    }

    pub fn auth_service(&self, client: ApiClient) -> AuthService {
        let service = AuthService::new(client);
        match self.logout_path {
            Some(ref path) => service.with_logout_path(path),
            None => service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"page_size": 25}"#).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.session_backend, SessionBackend::File);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                ENV_API_URL => Some("https://blog.example.com/api".to_string()),
                ENV_SESSION_BACKEND => Some("Keyring".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.session_backend, SessionBackend::Keyring);
        assert_eq!(config.base_url().unwrap().as_str(), "https://blog.example.com/api/");
    }

    #[test]
    fn test_bad_backend_override_is_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_SESSION_BACKEND).then(|| "floppy".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config {
            api_base_url: "not a url".into(),
            ..Config::default()
        };
        assert!(config.base_url().is_err());

        let config = Config {
            api_base_url: "mailto:someone@example.com".into(),
            ..Config::default()
        };
        assert!(config.base_url().is_err());
    }

    #[test]
    fn test_backend_serializes_lowercase() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["session_backend"], "file");
    }
}
