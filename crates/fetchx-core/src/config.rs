use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};

/// Retry policy parameters (optional sections in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff shape: "fixed", "linear" or "exponential".
    #[serde(default)]
    pub backoff: Backoff,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts.max(1),
            backoff: cfg.backoff,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
        }
    }
}

/// What the job loop does with an item whose transfer failed after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailurePolicy {
    /// Log the failure and move on to the next item.
    #[default]
    SkipItem,
    /// Pause the whole job with reason `transfer_failed`.
    PauseJob,
}

/// Global configuration loaded from `~/.config/fetchx/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchxConfig {
    /// Base URL of the metadata backend (`{backend}/metadata/{provider}/{route}`).
    pub backend_url: String,
    /// Root directory for downloaded assets (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Hard wall-clock limit on one transfer attempt before it is assumed complete.
    pub transfer_timeout_secs: u64,
    /// Total timeout for one metadata page request.
    pub metadata_timeout_secs: u64,
    /// Pause after each item transfer.
    pub item_delay_ms: u64,
    /// Pause after each provider page.
    #[serde(default)]
    pub page_delay_ms: u64,
    /// Pause between rotation cycles.
    pub cycle_delay_ms: u64,
    /// Consecutive cycles without a single successful transfer before the job is done.
    pub max_unproductive_cycles: u32,
    #[serde(default)]
    pub transfer_failure_policy: TransferFailurePolicy,
    /// Optional transfer retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub transfer_retry: Option<RetryConfig>,
    /// Optional metadata retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub metadata_retry: Option<RetryConfig>,
}

impl Default for FetchxConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3000".to_string(),
            download_dir: None,
            transfer_timeout_secs: 12,
            metadata_timeout_secs: 30,
            item_delay_ms: 150,
            page_delay_ms: 0,
            cycle_delay_ms: 200,
            max_unproductive_cycles: 5,
            transfer_failure_policy: TransferFailurePolicy::SkipItem,
            transfer_retry: None,
            metadata_retry: None,
        }
    }
}

impl FetchxConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs.max(1))
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs.max(1))
    }

    pub fn transfer_retry_policy(&self) -> RetryPolicy {
        self.transfer_retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_else(RetryPolicy::transfers)
    }

    pub fn metadata_retry_policy(&self) -> RetryPolicy {
        self.metadata_retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_else(RetryPolicy::metadata)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchx")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FetchxConfig = toml::from_str(&data)?;
    Ok(cfg)
}
