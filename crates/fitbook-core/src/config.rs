//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! location, request timeout, where credentials are kept, and the last used
//! username.
//!
//! Configuration is stored at `~/.config/fitbook/config.json`. The
//! `FITBOOK_BACKEND_URL` environment variable overrides the backend URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_TIMEOUT_SECS;
use crate::auth::{FileStore, KeyringStore, MemoryStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fitbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Timezone the class listing is requested in
const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

/// Environment variable overriding `backend_url`
pub const BACKEND_URL_ENV: &str = "FITBOOK_BACKEND_URL";

/// Where the session tokens are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    /// Full URL of the token refresh endpoint, if not `<backend_url>/token/refresh/`
    pub refresh_url: Option<String>,
    pub timeout_secs: u64,
    pub storage: StorageBackend,
    pub timezone: String,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            refresh_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from disk (defaults if absent), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
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

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_url = url;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    fn backend_root(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    /// Base URL all API paths are joined to
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.backend_root())
    }

    /// The refresh endpoint sits beside `/api`, not under it
    pub fn refresh_url(&self) -> String {
        self.refresh_url
            .clone()
            .unwrap_or_else(|| format!("{}/token/refresh/", self.backend_root()))
    }

    /// Open the configured token store
    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::open(&self.cache_dir()?)?),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}
