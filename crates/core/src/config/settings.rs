//! Process level settings

use super::batch::BatchConfig;
use crate::constants::DEFAULT_WORKER_THREADS;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Command line argument
    CommandLine,
}

/// Everything needed to stand up an executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Window parameters
    pub batch: BatchConfig,
    /// Size of the executor's own worker pool
    pub worker_threads: usize,
    /// Where the last applied layer came from
    pub source: ConfigSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            worker_threads: DEFAULT_WORKER_THREADS,
            source: ConfigSource::Default,
        }
    }
}

impl Settings {
    /// Validate the batch bounds and the worker pool size
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;
        if self.worker_threads == 0 {
            return Err(Error::configuration("worker threads must be at least 1"));
        }
        Ok(())
    }
}
