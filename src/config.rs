use crate::error::InitError;
use crate::input::InputMonitorConfig;
use crate::platform;
use crate::sync::SyncConfig;
use crate::tracker::TrackerConfig;
use clap::Parser;
use directories::BaseDirs;
use std::path::PathBuf;
use std::time::Duration;

/// Store file name inside the home directory.
pub const DEFAULT_DB_FILE: &str = "activity.db";

/// Background activity agent settings, from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "activity-agent", version, about)]
pub struct AgentConfig {
    /// Sync endpoint; without it the agent runs offline
    #[arg(long, env = "API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    /// Bearer credential sent with each sync request
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Store file (defaults to ~/activity.db)
    #[arg(long, env = "ACTIVITY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Foreground process that marks an idle or locked session
    #[arg(long, env = "IDLE_PROCESS_NAME")]
    pub idle_process: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub capture_interval_secs: u64,

    #[arg(long, default_value_t = 2)]
    pub input_poll_secs: u64,

    #[arg(long, default_value_t = 30 * 60)]
    pub sync_interval_secs: u64,

    /// How often the status line is logged
    #[arg(long, default_value_t = 30)]
    pub status_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            api_key: None,
            db_path: None,
            idle_process: None,
            capture_interval_secs: 10,
            input_poll_secs: 2,
            sync_interval_secs: 30 * 60,
            status_interval_secs: 30,
        }
    }
}

impl AgentConfig {
    pub fn resolve_db_path(&self) -> Result<PathBuf, InitError> {
        if let Some(path) = &self.db_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(InitError::DataDirCreation)?;
            }
            return Ok(path.clone());
        }
        default_db_path()
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            capture_interval: secs(self.capture_interval_secs),
            idle_process: self
                .idle_process
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| platform::default_idle_process().to_string()),
        }
    }

    pub fn input_monitor(&self) -> InputMonitorConfig {
        InputMonitorConfig {
            poll_interval: secs(self.input_poll_secs),
        }
    }

    /// `None` when no endpoint is configured.
    pub fn sync(&self) -> Option<SyncConfig> {
        let endpoint = self
            .api_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())?;
        let api_key = self.api_key.clone().filter(|k| !k.is_empty());
        let mut config = SyncConfig::new(endpoint, api_key);
        config.interval = secs(self.sync_interval_secs);
        Some(config)
    }

    pub fn status_interval(&self) -> Duration {
        secs(self.status_interval_secs)
    }
}

/// `~/activity.db`
pub fn default_db_path() -> Result<PathBuf, InitError> {
    let dirs = BaseDirs::new().ok_or(InitError::NoHomeDir)?;
    Ok(dirs.home_dir().join(DEFAULT_DB_FILE))
}

/// Zero intervals would spin; clamp to one second.
fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}
