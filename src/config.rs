//! Configuration types for the maintenance scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::retention::{DEFAULT_RETENTION_DAYS, RetentionWindow};

/// Top-level configuration for the maintenance scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpkeepConfig {
    /// Usage history retention settings.
    pub retention: RetentionConfig,
    /// Periodic maintenance job settings.
    pub job: JobConfig,
    /// Storage location settings.
    pub storage: StorageConfig,
}

/// Usage history retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// How many days of usage history to keep.
    pub window_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionConfig {
    /// The configured window as a [`RetentionWindow`].
    pub fn window(&self) -> RetentionWindow {
        RetentionWindow::days(self.window_days)
    }
}

/// Periodic maintenance job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Seconds between periodic maintenance wake-ups.
    pub interval_secs: u64,
    /// Seconds to wait before re-trying the schedule after an exact
    /// wake-up denial.
    pub recheck_delay_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3_600,
            recheck_delay_secs: 300,
        }
    }
}

impl JobConfig {
    /// The wake-up interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_secs.saturating_mul(1_000)
    }

    /// The denial recheck delay as a [`Duration`].
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }
}

/// Storage location configuration (stored in `~/.upkeep` by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding the usage history database.
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root_dir(),
        }
    }
}

fn default_storage_root_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".upkeep")
    } else {
        PathBuf::from("/tmp").join(".upkeep")
    }
}

impl UpkeepConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::UpkeepError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::UpkeepError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/upkeep/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("upkeep").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("upkeep")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/upkeep-config/config.toml")
        }
    }
}
