//! Builder methods for creating errors with context

use super::types::{BoxError, Error};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a capacity error for a buffer holding `capacity` calls
    #[must_use]
    pub fn capacity(capacity: usize) -> Self {
        Error::Capacity { capacity }
    }

    /// Create a batch function error without an underlying source
    #[must_use]
    pub fn batch_function(message: impl Into<String>) -> Self {
        Error::BatchFunction {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an error returned by a batch function
    #[must_use]
    pub fn batch_function_with_source(source: BoxError) -> Self {
        Error::BatchFunction {
            message: source.to_string(),
            source: Some(Arc::from(source)),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a worker pool error
    #[must_use]
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Error::WorkerPool {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source: Arc::new(source),
        }
    }

    /// Whether this error came out of a batch function invocation
    #[must_use]
    pub fn is_batch_failure(&self) -> bool {
        matches!(self, Error::BatchFunction { .. })
    }

    /// Whether this error is a consumer-side timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether two errors share the same underlying batch failure
    ///
    /// Every call of a failed batch receives a clone of one error; this
    /// compares the shared source rather than the rendered message.
    #[must_use]
    pub fn same_batch_failure(&self, other: &Error) -> bool {
        match (self, other) {
            (
                Error::BatchFunction {
                    source: Some(a), ..
                },
                Error::BatchFunction {
                    source: Some(b), ..
                },
            ) => Arc::ptr_eq(a, b),
            (
                Error::BatchFunction {
                    message: a,
                    source: None,
                },
                Error::BatchFunction {
                    message: b,
                    source: None,
                },
            ) => a == b,
            _ => false,
        }
    }
}
