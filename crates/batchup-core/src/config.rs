use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::tier::{DeviceTier, TierCeilings};

/// Scheduler policy constants (`[scheduler]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lower bound of the concurrency window.
    pub min_window: usize,
    /// Window at batch start, clamped into `[min_window, ceiling(tier)]`.
    pub initial_window: usize,
    /// Consecutive failures (no success in between) that abort the batch.
    pub failure_threshold: u32,
    /// Upper bound of the window per device tier.
    pub tiers: TierCeilings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_window: 1,
            initial_window: 3,
            failure_threshold: 20,
            tiers: TierCeilings::default(),
        }
    }
}

/// Rejected scheduler configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_window must be at least 1")]
    ZeroMinWindow,
    #[error("tier ceiling {ceiling} is below min_window {min_window}")]
    CeilingBelowMin { ceiling: usize, min_window: usize },
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,
    #[error("base_delay_secs must be a finite number of seconds between 0 and {max}")]
    BaseDelayOutOfRange { max: f64 },
}

impl SchedulerConfig {
    /// Check the invariants the scheduler relies on (`1 <= min <= every ceiling`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_window == 0 {
            return Err(ConfigError::ZeroMinWindow);
        }
        let smallest = self.tiers.smallest();
        if smallest < self.min_window {
            return Err(ConfigError::CeilingBelowMin {
                ceiling: smallest,
                min_window: self.min_window,
            });
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }

    /// Window ceiling for the given tier.
    pub fn max_window(&self, tier: DeviceTier) -> usize {
        self.tiers.ceiling(tier).max(self.min_window)
    }
}

/// HTTP PUT executor settings (`[upload]` section).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Base URL files are PUT under. The CLI `--endpoint` flag overrides it.
    pub endpoint: Option<String>,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Fail a transfer when no bytes move for this many seconds.
    pub stall_timeout_secs: u64,
    /// Hard cap on a single attempt, in seconds.
    pub max_duration_secs: u64,
    /// Extra request headers sent with every PUT.
    pub headers: BTreeMap<String, String>,
}

// Header values usually carry credentials; only the names are printed.
impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("endpoint", &self.endpoint)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("stall_timeout_secs", &self.stall_timeout_secs)
            .field("max_duration_secs", &self.max_duration_secs)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout_secs: 30,
            stall_timeout_secs: 180,
            max_duration_secs: 3600,
            headers: BTreeMap::new(),
        }
    }
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Largest accepted `base_delay_secs`.
pub const MAX_BASE_DELAY_SECS: f64 = 3600.0;

impl RetryConfig {
    /// `base_delay_secs` must be finite and within `0..=MAX_BASE_DELAY_SECS`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_BASE_DELAY_SECS).contains(&self.base_delay_secs) {
            return Err(ConfigError::BaseDelayOutOfRange {
                max: MAX_BASE_DELAY_SECS,
            });
        }
        Ok(())
    }

    /// Out-of-range delays (NaN, infinite, negative, huge) fall back to the default.
    pub fn to_policy(&self) -> RetryPolicy {
        let base_delay = Duration::try_from_secs_f64(self.base_delay_secs)
            .ok()
            .filter(|_| self.validate().is_ok())
            .unwrap_or_else(|| RetryPolicy::default().base_delay);
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/batchup/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchupConfig {
    /// Tier used when the CLI is not given `--tier`.
    #[serde(default)]
    pub default_tier: DeviceTier,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl BatchupConfig {
    /// Retry policy for the HTTP executor (configured or default).
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("batchup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BatchupConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BatchupConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<BatchupConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: BatchupConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.scheduler
        .validate()
        .with_context(|| format!("invalid [scheduler] in {}", path.display()))?;
    if let Some(retry) = &cfg.retry {
        retry
            .validate()
            .with_context(|| format!("invalid [retry] in {}", path.display()))?;
    }
    Ok(cfg)
}
