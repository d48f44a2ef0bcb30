use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::ingestor::backend::ExecutionMode;
use crate::ingestor::queue::QueueOrder;
use crate::models::SourceConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,
}

/// Behaviour of a single import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Events starting later than now + horizon lose their long description
    #[serde(
        default = "default_long_description_horizon",
        with = "duration_serde::duration"
    )]
    pub long_description_horizon: Duration,

    /// auto, worker or cooperative
    #[serde(default)]
    pub execution_mode: ExecutionMode,

    /// lifo processes the most recently queued source first
    #[serde(default)]
    pub queue_order: QueueOrder,

    /// Location the store reloads legacy EPG snapshots from
    #[serde(default = "default_legacy_epg_path")]
    pub legacy_epg_path: PathBuf,

    /// Minimum age of a downloaded channel mapping before it is fetched again
    #[serde(
        default = "default_channel_refresh_interval",
        with = "duration_serde::duration"
    )]
    pub channel_refresh_interval: Duration,
}

/// Where downloads are written before parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_path")]
    pub default_path: PathBuf,
    /// Mount points probed when the default path cannot be used
    #[serde(default = "default_scratch_candidates")]
    pub candidates: Vec<PathBuf>,
    #[serde(default = "default_scratch_min_free_bytes")]
    pub min_free_bytes: u64,
    /// The default path is only used above this much free space
    #[serde(default = "default_scratch_floor_bytes")]
    pub floor_bytes: u64,
    #[serde(default = "default_scratch_file_stem")]
    pub file_stem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(
        default = "default_connect_timeout",
        with = "duration_serde::duration"
    )]
    pub connect_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn parse_default_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or_default()
}

fn default_long_description_horizon() -> Duration {
    parse_default_duration(DEFAULT_LONG_DESCRIPTION_HORIZON)
}

fn default_legacy_epg_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEGACY_EPG_PATH)
}

fn default_channel_refresh_interval() -> Duration {
    parse_default_duration(DEFAULT_CHANNEL_REFRESH_INTERVAL)
}

fn default_scratch_path() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_PATH)
}

fn default_scratch_candidates() -> Vec<PathBuf> {
    DEFAULT_SCRATCH_CANDIDATES.iter().map(PathBuf::from).collect()
}

fn default_scratch_min_free_bytes() -> u64 {
    DEFAULT_SCRATCH_MIN_FREE_BYTES
}

fn default_scratch_floor_bytes() -> u64 {
    DEFAULT_SCRATCH_FLOOR_BYTES
}

fn default_scratch_file_stem() -> String {
    DEFAULT_SCRATCH_FILE_STEM.to_string()
}

fn default_connect_timeout() -> Duration {
    parse_default_duration(DEFAULT_CONNECT_TIMEOUT)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            long_description_horizon: default_long_description_horizon(),
            execution_mode: ExecutionMode::default(),
            queue_order: QueueOrder::default(),
            legacy_epg_path: default_legacy_epg_path(),
            channel_refresh_interval: default_channel_refresh_interval(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            default_path: default_scratch_path(),
            candidates: default_scratch_candidates(),
            min_free_bytes: default_scratch_min_free_bytes(),
            floor_bytes: default_scratch_floor_bytes(),
            file_stem: default_scratch_file_stem(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "epg-import.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
