//! Core error type definitions

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Result type alias for delaybatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error accepted from user supplied batch functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for delaybatch operations
///
/// The type is `Clone` so that one failure can be handed to every caller of a
/// batch. Non-cloneable sources are held behind an `Arc`, which also means all
/// clones of a batch failure point at the same underlying error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid construction or reconfiguration parameters
    Configuration { message: String },

    /// The active window's buffer is full
    Capacity { capacity: usize },

    /// The user batch function failed, panicked, or could not be scheduled
    BatchFunction {
        message: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// A consumer gave up waiting; the call itself keeps running
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The executor was shut down before the call was accepted
    Closed,

    /// Worker pool could not be created
    WorkerPool { message: String },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// JSON serialization/deserialization errors
    Json {
        message: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
}
