//! Shared utilities for delaybatch
//!
//! Currently this is the tracing setup used by the binary and the structured
//! event helpers the executor emits through.

pub mod tracing;

pub use tracing::*;
