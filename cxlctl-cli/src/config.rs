//! Configuration file support for cxlctl.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (CXLCTL_*)
//! 3. Local config file (./cxlctl.toml)
//! 4. Global config file (~/.config/cxlctl/config.toml)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cxlctl::TransferConfig;
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Firmware transfer tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSection {
    /// Transfer block size in bytes (multiple of 128).
    pub block_size: Option<usize>,
    /// Retries allowed per block.
    pub max_retries: Option<u32>,
    /// Delay before each retry, in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Delay between background status polls, in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

/// Output preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    /// Default to JSON output.
    #[serde(default)]
    pub json: bool,
    /// Force colors on or off; unset follows the terminal.
    pub color: Option<bool>,
}

/// Default device selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSection {
    /// Devices to operate on when none are given (mem<N> or all).
    pub selector: Option<Vec<String>>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer tuning.
    #[serde(default)]
    pub transfer: TransferSection,
    /// Output preferences.
    #[serde(default)]
    pub output: OutputSection,
    /// Device selection defaults.
    #[serde(default)]
    pub device: DeviceSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("cxlctl.toml")) {
            debug!("Loaded local config from cxlctl.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cxlctl").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.transfer.block_size.is_some() {
            self.transfer.block_size = other.transfer.block_size;
        }
        if other.transfer.max_retries.is_some() {
            self.transfer.max_retries = other.transfer.max_retries;
        }
        if other.transfer.retry_delay_ms.is_some() {
            self.transfer.retry_delay_ms = other.transfer.retry_delay_ms;
        }
        if other.transfer.poll_interval_ms.is_some() {
            self.transfer.poll_interval_ms = other.transfer.poll_interval_ms;
        }

        if other.output.json {
            self.output.json = true;
        }
        if other.output.color.is_some() {
            self.output.color = other.output.color;
        }

        if other.device.selector.is_some() {
            self.device.selector = other.device.selector;
        }
    }

    /// Transfer engine tunables with the configured overrides applied.
    pub fn transfer_config(&self) -> TransferConfig {
        let mut config = TransferConfig::default();
        if let Some(block_size) = self.transfer.block_size {
            config.block_size = block_size;
        }
        if let Some(max_retries) = self.transfer.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(ms) = self.transfer.retry_delay_ms {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.transfer.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        config
    }
}
