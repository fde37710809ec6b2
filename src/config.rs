use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/fetchq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchqConfig {
    /// Maximum queued batches held in memory before spilling to disk.
    pub max_queue_memory_items: usize,
    /// Sleep between dispatch attempts when no batch is ready (milliseconds).
    pub idle_sleep_ms: u64,
    /// Per-task fetch timeout in seconds; a task past this is cancelled.
    pub task_timeout_secs: u64,
    /// Grace period for pool termination at shutdown, in seconds.
    /// Defaults to twice the per-task timeout when unset.
    #[serde(default)]
    pub termination_timeout_secs: Option<u64>,
    /// Directory for the spillover file; the system temp dir when unset.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

impl Default for FetchqConfig {
    fn default() -> Self {
        Self {
            max_queue_memory_items: 1000,
            idle_sleep_ms: 1000,
            task_timeout_secs: 100,
            termination_timeout_secs: None,
            spool_dir: None,
        }
    }
}

impl FetchqConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Effective termination grace: configured value, or 2x the task timeout.
    pub fn termination_timeout(&self) -> Duration {
        match self.termination_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.task_timeout() * 2,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FetchqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
