//! Delayed batch execution.
//!
//! [`DelayedBatchExecutor`] gathers calls made concurrently from many threads
//! or tasks into time and size bounded windows, runs each window as a single
//! invocation of a user batch function on a worker pool, and routes every
//! positional result back to the caller that asked for it.
//!
//! Calls are tuples of one to six arguments; the batch function receives one
//! column per argument position. Outcomes can be consumed by blocking
//! ([`CallHandle::wait`]), as a future ([`CallFuture`]) or as a single-value
//! publisher ([`Single`]).

pub mod adapters;
pub mod adaptive;
pub mod call;
pub mod completion;
pub mod dedup;
pub mod dispatcher;
pub mod executor;
pub mod pool;
pub mod stats;
mod timer;
mod window;

pub use adapters::{CallFuture, Single};
pub use adaptive::AdaptiveSizing;
pub use call::{CallHandle, Outcome};
pub use completion::Completion;
pub use dedup::DuplicateResolution;
pub use dispatcher::BatchFn;
pub use executor::{DelayedBatchExecutor, ExecutorBuilder};
pub use pool::WorkerPool;
pub use stats::{ExecutorStats, StatsSnapshot};

pub use delaybatch_core::{Arguments, BatchConfig, BoxError, Error, Result};
