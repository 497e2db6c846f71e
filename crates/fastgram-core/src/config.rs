//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, request timing, the login flag lifetime, which backend holds the
//! session tokens, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/fastgram/config.json`. A handful of
//! settings can be overridden from the environment (see [`Config::apply_env`]).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "fastgram";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// HTTP request timeout.
/// 30s allows for slow API responses while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Lifetime of the "logged in" flag read by the route guard (7 days).
const DEFAULT_LOGIN_FLAG_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 7;

/// Longest accepted login flag lifetime (one year).
const MAX_LOGIN_FLAG_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365;

/// Maximum number of retries for rate-limited (429) requests.
const DEFAULT_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const DEFAULT_RATE_LIMIT_BACKOFF_MS: u64 = 1000;

pub const ENV_API_BASE_URL: &str = "FASTGRAM_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FASTGRAM_REQUEST_TIMEOUT_MS";
pub const ENV_STORAGE: &str = "FASTGRAM_STORAGE";

/// Where the session tokens are persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `session.json` in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Nothing survives the process
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub login_flag_max_age_secs: i64,
    pub rate_limit_retries: u32,
    pub rate_limit_backoff_ms: u64,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            login_flag_max_age_secs: DEFAULT_LOGIN_FLAG_MAX_AGE_SECS,
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            rate_limit_backoff_ms: DEFAULT_RATE_LIMIT_BACKOFF_MS,
            storage: StorageBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// The config file as written (or defaults). Environment overrides are
    /// applied separately with [`Config::apply_env`] so they never get saved.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse config file")
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

    /// Apply overrides from a variable lookup. Invalid values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.request_timeout_ms = ms,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_REQUEST_TIMEOUT_MS),
            }
        }

        if let Some(raw) = lookup(ENV_STORAGE) {
            match raw.parse() {
                Ok(backend) => self.storage = backend,
                Err(e) => warn!(error = %e, "Ignoring invalid {}", ENV_STORAGE),
            }
        }
    }

    /// Replace out-of-range values from the config file. Bad values are logged.
    pub fn sanitize(&mut self) {
        if self.login_flag_max_age_secs <= 0 {
            warn!(
                value = self.login_flag_max_age_secs,
                "Ignoring non-positive login_flag_max_age_secs"
            );
            self.login_flag_max_age_secs = DEFAULT_LOGIN_FLAG_MAX_AGE_SECS;
        } else if self.login_flag_max_age_secs > MAX_LOGIN_FLAG_MAX_AGE_SECS {
            warn!(
                value = self.login_flag_max_age_secs,
                max = MAX_LOGIN_FLAG_MAX_AGE_SECS,
                "Clamping login_flag_max_age_secs"
            );
            self.login_flag_max_age_secs = MAX_LOGIN_FLAG_MAX_AGE_SECS;
        }

        if self.request_timeout_ms == 0 {
            warn!("Ignoring zero request_timeout_ms");
            self.request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
    }

    /// API base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn login_flag_max_age(&self) -> chrono::Duration {
        let secs = self
            .login_flag_max_age_secs
            .clamp(1, MAX_LOGIN_FLAG_MAX_AGE_SECS);
        chrono::Duration::try_seconds(secs)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_LOGIN_FLAG_MAX_AGE_SECS))
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and logs
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
