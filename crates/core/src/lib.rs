//! Core domain types, errors, and constants for `delaybatch`.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias shared by every
//!   crate in the workspace.
//! - **`arguments`**: the `Arguments` trait that turns one call's argument
//!   tuple into the column lists handed to a batch function.
//! - **`config`**: window configuration, its bounds, and settings loading.
//! - **`constants`**: bounds, defaults and environment variable names.

pub mod arguments;
pub mod config;
pub mod constants;
pub mod errors;

pub use self::{
    arguments::Arguments,
    config::{BatchConfig, BatchConfigBuilder, CliOverrides, ConfigSource, Settings, SettingsLoader},
    constants::*,
    errors::{BoxError, Error, Result, ResultExt},
};
