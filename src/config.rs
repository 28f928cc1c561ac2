use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recorder::{RecordPolicy, DEFAULT_IGNORE_LIST};

pub const DEFAULT_DB_PATH: &str = "~/.wendb";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d  %H:%M:%S";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub recorder: RecorderConfig,
    pub display: DisplayConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub db_path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub ignore_duplicates: bool,
    pub ignore_leading_space: bool,
    pub ignore_list: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ignore_duplicates: true,
            ignore_leading_space: true,
            ignore_list: DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RecorderConfig {
    pub fn policy(&self) -> RecordPolicy {
        RecordPolicy {
            ignore_duplicates: self.ignore_duplicates,
            ignore_leading_space: self.ignore_leading_space,
            ignore_list: self
                .ignore_list
                .iter()
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub time_format: String,
    /// Newest events read by `show`; unbounded when absent.
    pub limit: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.into(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

impl DbConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn path() -> Option<PathBuf> {
        Some(Self::wen_dir()?.join("config.toml"))
    }

    pub fn wen_dir() -> Option<PathBuf> {
        Some(dirs::home_dir()?.join(".wen"))
    }
}
