//! Window configuration, validation and loading.
//!
//! - [`batch`] - the per-window `BatchConfig` snapshot and its bounds
//! - [`settings`] - process level settings (batch config plus worker threads)
//! - [`loader`] - precedence aware loading from file, environment and CLI

pub mod batch;
pub mod loader;
pub mod settings;

pub use batch::{BatchConfig, BatchConfigBuilder};
pub use loader::{CliOverrides, SettingsLoader};
pub use settings::{ConfigSource, Settings};
