//! Worker configuration.
//!
//! Read from `$MAILSIFT_CONFIG` when set, otherwise from
//! `<config dir>/mailsift/worker.json`. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::CACHE_FOLDER_NAME;
use crate::{Error, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MAILSIFT_CONFIG";

const APP_FOLDER: &str = "mailsift";
const CONFIG_FILE: &str = "worker.json";

/// Settings of one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    /// Directory the index store folder is created in.
    pub cache_dir: PathBuf,
    /// Drop every cached entry when the worker starts.
    pub clear_cache_on_start: bool,
    /// Progress interval used when `extract` carries none.
    pub default_progress_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_FOLDER),
            clear_cache_on_start: cfg!(debug_assertions),
            default_progress_interval_ms: 1000,
        }
    }
}

impl WorkerConfig {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_FOLDER)
            .join(CONFIG_FILE)
    }

    /// Loads the config from `$MAILSIFT_CONFIG` or the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map_or_else(Self::default_path, PathBuf::from);
        Self::load_from(&path).await
    }

    /// Loads the config from `path`, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No worker config, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "Worker config loaded");
        Ok(config)
    }

    /// Folder the index store lives in.
    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FOLDER_NAME)
    }

    /// Progress interval used when the host does not send one.
    #[must_use]
    pub const fn default_progress_interval(&self) -> Duration {
        Duration::from_millis(self.default_progress_interval_ms)
    }
}
