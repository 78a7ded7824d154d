//! The coordinator: owns the active window and routes submissions into it.

use crate::adapters::{CallFuture, Single};
use crate::adaptive::{AdaptiveSizer, AdaptiveSizing};
use crate::call::{CallHandle, Outcome, PendingCall};
use crate::dispatcher::{BatchFn, Dispatcher};
use crate::pool::WorkerPool;
use crate::stats::{ExecutorStats, StatsSnapshot};
use crate::timer::Timer;
use crate::window::{Append, BatchWindow};
use delaybatch_core::{Arguments, BatchConfig, Error, Result, Settings, DEFAULT_WORKER_THREADS};
use delaybatch_utils::{call_rejected, reconfigured, FlushTrigger};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coalesces concurrent calls with argument tuple `A` into batches and hands
/// each caller its own `Z`.
///
/// Calls land in the active window until it fills up (`max_batch_size`) or
/// its timer elapses (`window`), whichever comes first. The whole batch then
/// runs through the batch function on the worker pool, and results are
/// matched back to callers by position.
///
/// Ordering is only guaranteed inside one batch. After a reconfiguration a
/// later call may complete before an earlier one that is still waiting in the
/// previous window.
///
/// ```no_run
/// use delaybatch_executor::{BoxError, DelayedBatchExecutor};
/// use std::time::Duration;
///
/// let executor: DelayedBatchExecutor<(u64,), String> = DelayedBatchExecutor::new(
///     Duration::from_millis(50),
///     20,
///     |(ids,): (Vec<u64>,)| -> Result<Vec<String>, BoxError> {
///         Ok(ids.iter().map(|id| format!("product-{id}")).collect())
///     },
/// )?;
///
/// let name = executor.execute_blocking((7,))?;
/// assert_eq!(name.as_deref(), Some("product-7"));
/// # Ok::<(), delaybatch_executor::Error>(())
/// ```
pub struct DelayedBatchExecutor<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    batch_fn: Arc<dyn BatchFn<A, Z>>,
    active: RwLock<Arc<BatchWindow<A, Z>>>,
    // set under the `active` write lock
    closed: AtomicBool,
    reconfigure_lock: Mutex<()>,
    timer: Arc<Timer>,
    owned_pools: Mutex<Vec<WorkerPool>>,
    stats: Arc<ExecutorStats>,
    next_window_id: AtomicU64,
    adaptive: Option<AdaptiveSizer>,
}

impl<A, Z> DelayedBatchExecutor<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    /// Create an executor with its own worker pool and default buffer
    /// capacity and deduplication
    pub fn new(
        window: Duration,
        max_batch_size: usize,
        batch_fn: impl BatchFn<A, Z>,
    ) -> Result<Self> {
        Self::builder(batch_fn)
            .window(window)
            .max_batch_size(max_batch_size)
            .build()
    }

    pub fn builder(batch_fn: impl BatchFn<A, Z>) -> ExecutorBuilder<A, Z> {
        ExecutorBuilder::new(Arc::new(batch_fn))
    }

    /// Submit one call and return a handle to its eventual outcome.
    ///
    /// Fails immediately with a capacity error when the active window's
    /// buffer is full, and with [`Error::Closed`] after [`close`](Self::close).
    pub fn submit(&self, args: A) -> Result<CallHandle<Z>> {
        if let Some(sizer) = &self.adaptive {
            if let Some(size) = sizer.observe() {
                self.apply_adaptive_size(size);
            }
        }

        let (mut call, handle) = PendingCall::new(args);
        loop {
            let window = {
                let active = self.active.read();
                if self.closed.load(Ordering::Acquire) {
                    return Err(Error::Closed);
                }
                Arc::clone(&*active)
            };

            match window.append(call) {
                Append::Accepted => {
                    self.stats.record_submitted();
                    return Ok(handle);
                }
                Append::Flushed => {
                    self.stats.record_submitted();
                    self.replace_window(&window);
                    return Ok(handle);
                }
                Append::Closed(returned) => {
                    self.replace_window(&window);
                    call = returned;
                }
                Append::Full(returned) => {
                    let capacity = window.config().buffer_capacity;
                    tracing::trace!(call_id = returned.id(), "call dropped before dispatch");
                    call_rejected(window.id(), capacity);
                    self.stats.record_rejected();
                    return Err(Error::capacity(capacity));
                }
            }
        }
    }

    /// Submit and block the calling thread until the outcome arrives
    pub fn execute_blocking(&self, args: A) -> Outcome<Z> {
        self.submit(args)?.wait()
    }

    /// Submit and block for at most `timeout`.
    ///
    /// A timeout does not withdraw the call; it still runs with its batch.
    pub fn execute_blocking_timeout(&self, args: A, timeout: Duration) -> Outcome<Z> {
        self.submit(args)?.wait_timeout(timeout)
    }

    /// Submit and return a future for the outcome
    pub fn execute_async(&self, args: A) -> Result<CallFuture<Z>> {
        self.submit(args).map(CallFuture::new)
    }

    /// Submit and return a single-value publisher for the outcome
    pub fn execute_reactive(&self, args: A) -> Result<Single<Z>> {
        self.submit(args).map(Single::new)
    }

    /// Install a fresh window bound to `config` for future submissions.
    ///
    /// The outgoing window keeps its calls and flushes on its own trigger.
    /// Returns `Ok(false)` when `config` equals the current configuration,
    /// and an error without changing anything when `config` is invalid.
    pub fn reconfigure(&self, config: BatchConfig) -> Result<bool> {
        self.apply(config, None)
    }

    /// Like [`reconfigure`](Self::reconfigure), also moving future batches to
    /// `pool`. A pool supplied here is never shut down by the executor.
    pub fn reconfigure_with_pool(&self, config: BatchConfig, pool: WorkerPool) -> Result<bool> {
        self.apply(config, Some(pool))
    }

    /// Configuration of the active window
    pub fn config(&self) -> BatchConfig {
        self.active.read().config().clone()
    }

    /// Calls buffered in the active window and not yet flushed
    pub fn pending_calls(&self) -> usize {
        self.active.read().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Pool that runs batches of the active window
    pub fn worker_pool(&self) -> WorkerPool {
        self.active.read().dispatcher().pool().clone()
    }

    pub fn adaptive_sizing(&self) -> Option<&AdaptiveSizing> {
        self.adaptive.as_ref().map(AdaptiveSizer::policy)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting calls, flush every window, and stop owned threads.
    ///
    /// Calls already accepted are dispatched before the executor's own pool
    /// finishes; a pool passed in by the caller keeps running.
    pub fn close(&self) {
        let window = {
            let active = self.active.write();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            Arc::clone(&*active)
        };

        window.flush(FlushTrigger::Shutdown);
        self.timer.shutdown();
        let pools = std::mem::take(&mut *self.owned_pools.lock());
        for pool in pools {
            pool.shutdown();
        }
        tracing::debug!(stats = ?self.stats.snapshot(), "executor closed");
    }

    fn apply(&self, config: BatchConfig, pool: Option<WorkerPool>) -> Result<bool> {
        config.validate()?;
        if pool.as_ref().is_some_and(WorkerPool::is_shutdown) {
            return Err(Error::configuration("worker pool is shut down"));
        }

        let _guard = self.reconfigure_lock.lock();
        let current = Arc::clone(&*self.active.read());
        let current_pool = current.dispatcher().pool();
        let pool = pool.unwrap_or_else(|| current_pool.clone());
        if current.config() == &config && pool.same_pool(current_pool) {
            return Ok(false);
        }

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.batch_fn),
            pool,
            config.deduplicate,
            Arc::clone(&self.stats),
        ));
        let window = Arc::new(BatchWindow::new(
            self.next_window_id(),
            config,
            dispatcher,
            Arc::clone(&self.timer),
        ));

        {
            let mut active = self.active.write();
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Closed);
            }
            *active = Arc::clone(&window);
        }

        self.stats.record_reconfiguration();
        reconfigured(window.id(), window.config().window, window.config().max_batch_size);
        Ok(true)
    }

    fn apply_adaptive_size(&self, size: usize) {
        let mut config = self.config();
        if config.max_batch_size == size {
            return;
        }
        config.max_batch_size = size;
        if let Err(e) = self.reconfigure(config) {
            tracing::warn!(error = %e, size, "adaptive resize was not applied");
        }
    }

    /// Swap in a successor if `stale` is still the active window
    fn replace_window(&self, stale: &Arc<BatchWindow<A, Z>>) {
        let mut active = self.active.write();
        if self.closed.load(Ordering::Acquire) || !Arc::ptr_eq(&*active, stale) {
            return;
        }
        *active = Arc::new(stale.successor(self.next_window_id()));
    }

    fn next_window_id(&self) -> u64 {
        self.next_window_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl<A, Z> Drop for DelayedBatchExecutor<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<A, Z> std::fmt::Debug for DelayedBatchExecutor<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.read();
        f.debug_struct("DelayedBatchExecutor")
            .field("arity", &A::ARITY)
            .field("config", active.config())
            .field("window_id", &active.id())
            .field("window_state", &active.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Step-by-step construction of a [`DelayedBatchExecutor`]
pub struct ExecutorBuilder<A: Arguments, Z> {
    batch_fn: Arc<dyn BatchFn<A, Z>>,
    config: BatchConfig,
    worker_threads: usize,
    worker_pool: Option<WorkerPool>,
    adaptive: Option<AdaptiveSizing>,
}

impl<A, Z> ExecutorBuilder<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    fn new(batch_fn: Arc<dyn BatchFn<A, Z>>) -> Self {
        Self {
            batch_fn,
            config: BatchConfig::default(),
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_pool: None,
            adaptive: None,
        }
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config.max_batch_size = max_batch_size;
        self
    }

    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.config.buffer_capacity = buffer_capacity;
        self
    }

    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.config.deduplicate = deduplicate;
        self
    }

    /// Replace every window parameter at once
    pub fn config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply loaded settings: window parameters and worker thread count
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.config = settings.batch.clone();
        self.worker_threads = settings.worker_threads;
        self
    }

    /// Size of the pool the executor creates when none is supplied
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Run batches on an existing pool; the executor will not shut it down
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.worker_pool = Some(pool);
        self
    }

    /// Let the observed submission rate drive `max_batch_size`
    pub fn adaptive(mut self, policy: AdaptiveSizing) -> Self {
        self.adaptive = Some(policy);
        self
    }

    pub fn build(self) -> Result<DelayedBatchExecutor<A, Z>> {
        self.config.validate()?;
        if let Some(policy) = &self.adaptive {
            policy.validate()?;
        }

        let mut owned_pools = Vec::new();
        let pool = match self.worker_pool {
            Some(pool) if pool.is_shutdown() => {
                return Err(Error::configuration("worker pool is shut down"));
            }
            Some(pool) => pool,
            None => {
                let pool = WorkerPool::new(self.worker_threads)?;
                owned_pools.push(pool.clone());
                pool
            }
        };

        let timer = Arc::new(Timer::start()?);
        let stats = Arc::new(ExecutorStats::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.batch_fn),
            pool,
            self.config.deduplicate,
            Arc::clone(&stats),
        ));
        let window = Arc::new(BatchWindow::new(0, self.config, dispatcher, Arc::clone(&timer)));

        tracing::debug!(
            arity = A::ARITY,
            window_ms = window.config().window.as_millis() as u64,
            max_batch_size = window.config().max_batch_size,
            "executor started"
        );

        Ok(DelayedBatchExecutor {
            batch_fn: self.batch_fn,
            active: RwLock::new(window),
            closed: AtomicBool::new(false),
            reconfigure_lock: Mutex::new(()),
            timer,
            owned_pools: Mutex::new(owned_pools),
            stats,
            next_window_id: AtomicU64::new(1),
            adaptive: self.adaptive.map(AdaptiveSizer::new),
        })
    }
}
