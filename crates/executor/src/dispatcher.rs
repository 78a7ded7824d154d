//! Runs a flushed batch through the user batch function and fans the outcome
//! back out to every call.

use crate::call::{Outcome, PendingCall};
use crate::completion::Completion;
use crate::dedup::DuplicateResolution;
use crate::pool::{panic_message, WorkerPool};
use crate::stats::ExecutorStats;
use delaybatch_core::{Arguments, BoxError, Error};
use delaybatch_utils::{batch_completed, batch_failed, batch_span};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// The integrator-supplied bulk operation.
///
/// Receives one column per argument position, all of equal length, and
/// returns results aligned by position. A shorter result leaves the missing
/// tail as `None` for those callers; extra results are ignored. An error is
/// delivered to every call of the batch.
pub trait BatchFn<A: Arguments, Z>: Send + Sync + 'static {
    fn call(&self, columns: A::Columns) -> std::result::Result<Vec<Z>, BoxError>;
}

impl<A, Z, F> BatchFn<A, Z> for F
where
    A: Arguments,
    F: Fn(A::Columns) -> std::result::Result<Vec<Z>, BoxError> + Send + Sync + 'static,
{
    fn call(&self, columns: A::Columns) -> std::result::Result<Vec<Z>, BoxError> {
        self(columns)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("batch function panicked: {0}")]
struct BatchPanic(String);

/// Dispatch settings shared by every window of one configuration generation
pub(crate) struct Dispatcher<A: Arguments, Z> {
    batch_fn: Arc<dyn BatchFn<A, Z>>,
    pool: WorkerPool,
    deduplicate: bool,
    stats: Arc<ExecutorStats>,
}

impl<A, Z> Dispatcher<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    pub(crate) fn new(
        batch_fn: Arc<dyn BatchFn<A, Z>>,
        pool: WorkerPool,
        deduplicate: bool,
        stats: Arc<ExecutorStats>,
    ) -> Self {
        Self {
            batch_fn,
            pool,
            deduplicate,
            stats,
        }
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn stats(&self) -> &Arc<ExecutorStats> {
        &self.stats
    }

    /// Hand a flushed batch to the worker pool. Empty batches are ignored.
    ///
    /// If the pool refuses the job every call is completed with a batch
    /// function error on the current thread, so nobody waits forever.
    pub(crate) fn dispatch(&self, window_id: u64, calls: Vec<PendingCall<A, Z>>) {
        if calls.is_empty() {
            return;
        }

        let completions: Vec<Arc<Completion<Outcome<Z>>>> =
            calls.iter().map(|call| Arc::clone(call.completion())).collect();

        let batch_fn = Arc::clone(&self.batch_fn);
        let stats = Arc::clone(&self.stats);
        let deduplicate = self.deduplicate;
        let scheduled = self.pool.execute(move || {
            run_batch(window_id, calls, batch_fn.as_ref(), deduplicate, &stats);
        });

        if let Err(e) = scheduled {
            let error = Error::batch_function_with_source(Box::new(e));
            batch_failed(window_id, completions.len(), &error);
            self.stats.record_batch_failed();
            for completion in completions {
                completion.complete(Err(error.clone()));
            }
        }
    }
}

/// Execute one batch on the current thread and complete every call in it.
pub(crate) fn run_batch<A, Z>(
    window_id: u64,
    calls: Vec<PendingCall<A, Z>>,
    batch_fn: &dyn BatchFn<A, Z>,
    deduplicate: bool,
    stats: &ExecutorStats,
) where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    let total = calls.len();
    let _span = batch_span(window_id, total).entered();
    let started = Instant::now();

    let (args, completions): (Vec<A>, Vec<_>) =
        calls.into_iter().map(PendingCall::into_parts).unzip();

    let resolution = if deduplicate {
        DuplicateResolution::resolve(&args)
    } else {
        DuplicateResolution::identity(total)
    };

    let unique_args: Vec<A> = if resolution.duplicate_count() == 0 {
        args
    } else {
        resolution
            .unique()
            .iter()
            .map(|&index| args[index].clone())
            .collect()
    };
    let expected = unique_args.len();
    let columns = A::transpose(unique_args);

    let results = match catch_unwind(AssertUnwindSafe(|| batch_fn.call(columns))) {
        Ok(Ok(results)) => Ok(fit_results(results, expected)),
        Ok(Err(source)) => Err(Error::batch_function_with_source(source)),
        Err(panic) => Err(Error::batch_function_with_source(Box::new(BatchPanic(
            panic_message(panic.as_ref()),
        )))),
    };

    let mut outcomes: Vec<Option<Outcome<Z>>> = (0..total).map(|_| None).collect();
    match results {
        Ok(values) => {
            for (&position, value) in resolution.unique().iter().zip(values) {
                outcomes[position] = Some(Ok(value));
            }
        }
        Err(error) => {
            batch_failed(window_id, total, &error);
            stats.record_batch_failed();
            for &position in resolution.unique() {
                outcomes[position] = Some(Err(error.clone()));
            }
        }
    }

    for (&duplicate, &representative) in resolution.duplicate_of() {
        outcomes[duplicate] = outcomes[representative].clone();
    }
    stats.record_deduplicated(resolution.duplicate_count());

    for (completion, outcome) in completions.into_iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| {
            Err(Error::batch_function(
                "no outcome was produced for this call",
            ))
        });
        completion.complete(outcome);
    }

    batch_completed(
        window_id,
        expected,
        resolution.duplicate_count(),
        started.elapsed(),
    );
}

/// Align a result list to `expected` positions: pad with `None`, drop extras
fn fit_results<Z>(results: Vec<Z>, expected: usize) -> Vec<Option<Z>> {
    if results.len() != expected {
        tracing::debug!(
            returned = results.len(),
            expected,
            "batch function result length differs from batch size"
        );
    }
    results
        .into_iter()
        .map(Some)
        .chain(std::iter::repeat_with(|| None))
        .take(expected)
        .collect()
}
