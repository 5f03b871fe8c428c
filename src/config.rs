//! Configuration management
//!
//! Settings live in a TOML file under the platform config directory.
//! Every section and key is optional; a missing file means defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::download::DEFAULT_BASE_URL;
use crate::error::{Error, Result};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "spansh-galaxy-store")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: project_dirs()
                .map(|d| d.data_dir().join("galaxy.sqlite3"))
                .unwrap_or_else(|| PathBuf::from("galaxy.sqlite3")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Worker threads; 0 means one per available core
    pub jobs: usize,
    pub document_timeout_secs: u64,
    pub max_retries: u32,
    pub busy_timeout_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            document_timeout_secs: 60,
            max_retries: 3,
            busy_timeout_ms: 5000,
        }
    }
}

impl ImportConfig {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn workers(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub cache_dir: Option<PathBuf>,
    pub base_url: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub download: DownloadConfig,
}

impl Config {
    /// `<platform config dir>/config.toml`
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Merge the file at `path` over the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Read one `section.key` setting as text
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "database.path" => self.database.path.display().to_string(),
            "import.jobs" => self.import.jobs.to_string(),
            "import.document_timeout_secs" => self.import.document_timeout_secs.to_string(),
            "import.max_retries" => self.import.max_retries.to_string(),
            "import.busy_timeout_ms" => self.import.busy_timeout_ms.to_string(),
            "download.cache_dir" => self
                .download
                .cache_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "download.base_url" => self.download.base_url.clone(),
            _ => return Err(Error::Config(format!("unknown setting '{}'", key))),
        };
        Ok(value)
    }

    /// Change one `section.key` setting from text
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Config(format!("'{}' needs a number, got '{}'", key, value)))
        }

        match key {
            "database.path" => self.database.path = PathBuf::from(value),
            "import.jobs" => self.import.jobs = number(key, value)?,
            "import.document_timeout_secs" => {
                self.import.document_timeout_secs = number(key, value)?
            }
            "import.max_retries" => self.import.max_retries = number(key, value)?,
            "import.busy_timeout_ms" => self.import.busy_timeout_ms = number(key, value)?,
            "download.cache_dir" => {
                self.download.cache_dir = Some(value)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            }
            "download.base_url" => self.download.base_url = value.to_string(),
            _ => return Err(Error::Config(format!("unknown setting '{}'", key))),
        }
        Ok(())
    }
}
