//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => write!(f, "configuration error: {message}"),
            Error::Capacity { capacity } => {
                write!(
                    f,
                    "batch buffer is full ({capacity} calls pending), request rejected"
                )
            }
            Error::BatchFunction { message, .. } => write!(f, "batch function failed: {message}"),
            Error::Timeout {
                operation,
                duration,
            } => {
                write!(f, "operation '{operation}' timed out after {duration:?}")
            }
            Error::Closed => write!(f, "executor is closed"),
            Error::WorkerPool { message } => write!(f, "worker pool error: {message}"),
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Json { message, .. } => write!(f, "JSON error: {message}"),
        }
    }
}
