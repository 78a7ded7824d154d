//! Batch window configuration and its bounds

use crate::constants::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_DEDUPLICATE, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WINDOW,
    MAX_BATCH_SIZE, MAX_WINDOW, MIN_WINDOW,
};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration snapshot a batch window is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum age of the oldest call before the window is flushed
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
    /// Number of calls that forces a flush
    pub max_batch_size: usize,
    /// Calls a window buffers before rejecting further submissions
    pub buffer_capacity: usize,
    /// Coalesce structurally equal calls inside one batch
    pub deduplicate: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            deduplicate: DEFAULT_DEDUPLICATE,
        }
    }
}

impl BatchConfig {
    /// Create a configuration with default buffer capacity and deduplication
    #[must_use]
    pub fn new(window: Duration, max_batch_size: usize) -> Self {
        Self {
            window,
            max_batch_size,
            ..Default::default()
        }
    }

    /// Start building a configuration from the defaults
    #[must_use]
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
    }

    /// Check every bound; nothing is partially applied on failure
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size < 1 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(Error::configuration(format!(
                "max batch size must be in range [1,{MAX_BATCH_SIZE}], got {}",
                self.max_batch_size
            )));
        }

        if self.window < MIN_WINDOW || self.window > MAX_WINDOW {
            return Err(Error::configuration(format!(
                "window must be in range [{},{}] ms, got {:?}",
                MIN_WINDOW.as_millis(),
                MAX_WINDOW.as_millis(),
                self.window
            )));
        }

        if self.buffer_capacity < 1 {
            return Err(Error::configuration(
                "buffer capacity must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Builder for [`BatchConfig`]
#[derive(Debug, Clone, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window duration
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    /// Set the size trigger
    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config.max_batch_size = max_batch_size;
        self
    }

    /// Set the per-window buffer capacity
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.config.buffer_capacity = buffer_capacity;
        self
    }

    /// Enable or disable duplicate coalescing
    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.config.deduplicate = deduplicate;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<BatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        for size in [0, MAX_BATCH_SIZE + 1] {
            let err = BatchConfig::new(Duration::from_millis(10), size)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("max batch size must be in range [1,1024]"));
        }
        assert!(BatchConfig::new(Duration::from_millis(10), 1).validate().is_ok());
        assert!(BatchConfig::new(Duration::from_millis(10), MAX_BATCH_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_window_bounds() {
        for window in [Duration::ZERO, Duration::from_micros(999), Duration::from_millis(10_001)] {
            let err = BatchConfig::new(window, 8).validate().unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }));
            assert!(err.to_string().contains("window must be in range [1,10000] ms"));
        }
        assert!(BatchConfig::new(MIN_WINDOW, 8).validate().is_ok());
        assert!(BatchConfig::new(MAX_WINDOW, 8).validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_capacity_rejected() {
        let result = BatchConfig::builder().buffer_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = BatchConfig::builder()
            .window(Duration::from_millis(25))
            .max_batch_size(10)
            .buffer_capacity(100)
            .deduplicate(false)
            .build()
            .unwrap();
        assert_eq!(config.window, Duration::from_millis(25));
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.buffer_capacity, 100);
        assert!(!config.deduplicate);
    }

    #[test]
    fn test_serializes_window_as_millis() {
        let json = serde_json::to_value(BatchConfig::new(Duration::from_millis(120), 4)).unwrap();
        assert_eq!(json["window_ms"], 120);
        let back: BatchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.window, Duration::from_millis(120));
    }
}
