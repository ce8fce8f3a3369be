//! Runtime configuration loaded from `config.toml`.
//!
//! # Responsibility
//! - Define the on-disk config shape and its defaults.
//! - Resolve the per-user home directory (`~/.duetask`).
//!
//! # Invariants
//! - A missing config file means defaults, never an error.
//! - `validate()` runs on every load; invalid values are rejected, not clamped.

use crate::engine::SchedulerOptions;
use crate::notify::NotificationBackend;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HOME_DIR_NAME: &str = ".duetask";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "todos.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    HomeNotSet,
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HomeNotSet => write!(f, "HOME is not set"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => write!(f, "parse {}: {source}", path.display()),
            Self::Serialize(err) => write!(f, "serialize config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::HomeNotSet | Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreSection,
    pub scheduler: SchedulerSection,
    pub notifications: NotificationsSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Defaults to `~/.duetask/todos.sqlite3` when unset.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub check_interval_minutes: u64,
    pub cycle_timeout_secs: u64,
    pub startup_notification: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            check_interval_minutes: 30,
            cycle_timeout_secs: 120,
            startup_notification: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    pub backend: NotificationBackend,
    /// Show "Task Created/Updated/Deleted" confirmations on CRUD.
    pub crud_confirmations: bool,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            backend: NotificationBackend::Desktop,
            crud_confirmations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute directory; defaults to `~/.duetask/logs`.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.check_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.check_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.scheduler.cycle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.cycle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(dir) = &self.logging.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            check_interval: Duration::from_secs(self.scheduler.check_interval_minutes * 60),
            cycle_timeout: Duration::from_secs(self.scheduler.cycle_timeout_secs),
            startup_notification: self.scheduler.startup_notification,
        }
    }

    /// Database path, falling back to the home directory default.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(duetask_home()?.join(DB_FILE_NAME)),
        }
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.logging.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(duetask_home()?.join("logs")),
        }
    }
}

/// `$HOME/.duetask`. Not created here.
pub fn duetask_home() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeNotSet)?;
    Ok(PathBuf::from(home).join(HOME_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(duetask_home()?.join(CONFIG_FILE_NAME))
}

/// Loads and validates config from `path`; defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Writes `config` to `path`, creating parent directories.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    fs::write(path, raw).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
