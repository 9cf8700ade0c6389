//! # Config Module
//!
//! User settings, stored as JSON at `~/.mediamanager.cfg.json`.
//!
//! Components never read this file. The CLI loads it and hands explicit
//! values to each constructor.

use crate::core::convert::ConverterTool;
use crate::core::geocode::DEFAULT_USER_AGENT;
use crate::core::walker::DEFAULT_MAX_WORKERS;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the settings file in the home directory
pub const CONFIG_FILE_NAME: &str = ".mediamanager.cfg.json";

/// Index file name used when none is given
pub const DEFAULT_DATABASE_NAME: &str = ".mediamanager.sqlite3";

/// Minimum seconds between geocoding requests
pub const DEFAULT_GEOCODE_INTERVAL_SECS: u64 = 5;

/// Persisted user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite index file
    pub database_file: PathBuf,
    /// Archive root
    pub media_directory: PathBuf,
    /// Where duplicates are moved
    pub duplicate_directory: PathBuf,
    /// Base names that are never processed
    #[serde(default = "default_skip_files")]
    pub skip_files: Vec<String>,
    /// Street address to place name overrides
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_geocode_interval")]
    pub geocode_interval_secs: u64,
    #[serde(default = "default_user_agent")]
    pub geocode_user_agent: String,
    #[serde(default)]
    pub converter: ConverterTool,
}

fn default_skip_files() -> Vec<String> {
    vec![".DS_Store".to_string(), "Thumbs.db".to_string()]
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_geocode_interval() -> u64 {
    DEFAULT_GEOCODE_INTERVAL_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Settings {
    /// Settings with defaults for everything but the two directories.
    ///
    /// The index goes next to the settings file in the home directory.
    pub fn new(
        media_directory: impl Into<PathBuf>,
        duplicate_directory: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(Self::with_database(
            home.join(DEFAULT_DATABASE_NAME),
            media_directory,
            duplicate_directory,
        ))
    }

    pub fn with_database(
        database_file: impl Into<PathBuf>,
        media_directory: impl Into<PathBuf>,
        duplicate_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database_file: database_file.into(),
            media_directory: media_directory.into(),
            duplicate_directory: duplicate_directory.into(),
            skip_files: default_skip_files(),
            locations: BTreeMap::new(),
            max_workers: DEFAULT_MAX_WORKERS,
            geocode_interval_secs: DEFAULT_GEOCODE_INTERVAL_SECS,
            geocode_user_agent: default_user_agent(),
            converter: ConverterTool::default(),
        }
    }

    /// `~/.mediamanager.cfg.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoHomeDirectory)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: Settings =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if settings.max_workers == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "max_workers must be at least 1".to_string(),
            });
        }

        Ok(settings)
    }

    /// Write pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        fs::write(path, json).map_err(write_error)
    }

    pub fn geocode_interval(&self) -> Duration {
        Duration::from_secs(self.geocode_interval_secs)
    }
}
