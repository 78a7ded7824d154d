//! Settings loading with precedence: defaults < config file < environment < CLI

use super::settings::{ConfigSource, Settings};
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DELAYBATCH_BUFFER_CAPACITY_VAR,
    DELAYBATCH_DEDUPLICATE_VAR, DELAYBATCH_MAX_BATCH_SIZE_VAR, DELAYBATCH_WINDOW_MS_VAR,
    DELAYBATCH_WORKER_THREADS_VAR,
};
use crate::errors::{Error, Result, ResultExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Partial settings as they appear in a config file or the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    window_ms: Option<u64>,
    max_batch_size: Option<usize>,
    buffer_capacity: Option<usize>,
    worker_threads: Option<usize>,
    deduplicate: Option<bool>,
}

impl RawSettings {
    fn is_empty(&self) -> bool {
        self.window_ms.is_none()
            && self.max_batch_size.is_none()
            && self.buffer_capacity.is_none()
            && self.worker_threads.is_none()
            && self.deduplicate.is_none()
    }

    fn apply(self, mut settings: Settings, source: ConfigSource) -> Settings {
        if let Some(window_ms) = self.window_ms {
            settings.batch.window = Duration::from_millis(window_ms);
        }
        if let Some(size) = self.max_batch_size {
            settings.batch.max_batch_size = size;
        }
        if let Some(capacity) = self.buffer_capacity {
            settings.batch.buffer_capacity = capacity;
        }
        if let Some(threads) = self.worker_threads {
            settings.worker_threads = threads;
        }
        if let Some(deduplicate) = self.deduplicate {
            settings.batch.deduplicate = deduplicate;
        }
        settings.source = source;
        settings
    }
}

/// Command line overrides, highest precedence
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub window_ms: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub buffer_capacity: Option<usize>,
    pub worker_threads: Option<usize>,
    pub deduplicate: Option<bool>,
}

/// Configuration loader that handles precedence
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from the default config file location and the environment
    pub fn load() -> Result<Settings> {
        Self::load_with_file(&Self::get_config_file_path()?)
    }

    /// Load settings using an explicit config file path
    pub fn load_with_file(path: &Path) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(file_config) = Self::load_from_config_file(path)? {
            settings = file_config.apply(settings, ConfigSource::ConfigFile(path.to_path_buf()));
        }

        if let Some(env_config) = Self::load_from_env()? {
            settings = env_config.apply(
                settings,
                ConfigSource::EnvironmentVariable("DELAYBATCH_*".to_string()),
            );
        }

        settings.validate()?;
        tracing::debug!(source = ?settings.source, "settings loaded");
        Ok(settings)
    }

    /// Apply command line arguments and re-validate
    pub fn apply_cli_overrides(settings: Settings, overrides: CliOverrides) -> Result<Settings> {
        let raw = RawSettings {
            window_ms: overrides.window_ms,
            max_batch_size: overrides.max_batch_size,
            buffer_capacity: overrides.buffer_capacity,
            worker_threads: overrides.worker_threads,
            deduplicate: overrides.deduplicate,
        };
        if raw.is_empty() {
            return Ok(settings);
        }

        let settings = raw.apply(settings, ConfigSource::CommandLine);
        settings.validate()?;
        Ok(settings)
    }

    /// Get the configuration file path
    pub fn get_config_file_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
        } else {
            dirs::config_dir().ok_or_else(|| {
                Error::configuration(
                    "could not determine config directory; set XDG_CONFIG_HOME or HOME",
                )
            })?
        };

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn load_from_config_file(path: &Path) -> Result<Option<RawSettings>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;

        let raw: RawSettings = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(Some(raw))
    }

    fn load_from_env() -> Result<Option<RawSettings>> {
        let raw = RawSettings {
            window_ms: parse_env(DELAYBATCH_WINDOW_MS_VAR)?,
            max_batch_size: parse_env(DELAYBATCH_MAX_BATCH_SIZE_VAR)?,
            buffer_capacity: parse_env(DELAYBATCH_BUFFER_CAPACITY_VAR)?,
            worker_threads: parse_env(DELAYBATCH_WORKER_THREADS_VAR)?,
            deduplicate: parse_env(DELAYBATCH_DEDUPLICATE_VAR)?,
        };

        if raw.is_empty() {
            Ok(None)
        } else {
            Ok(Some(raw))
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::configuration(format!("invalid value '{value}' for {name}"))),
        Err(_) => Ok(None),
    }
}
