//! One accumulation window and its dual flush trigger.
//!
//! A window moves `Open -> Flushing -> Closed` exactly once. Every state change
//! happens under the window's mutex with a compare-and-swap from `Open`, so
//! the size trigger and the time trigger can race freely and only one of them
//! takes the calls.

use crate::call::PendingCall;
use crate::dispatcher::Dispatcher;
use crate::timer::{Expire, Timer};
use delaybatch_core::{Arguments, BatchConfig};
use delaybatch_utils::{batch_flushed, FlushTrigger};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

const OPEN: u8 = 0;
const FLUSHING: u8 = 1;
const CLOSED: u8 = 2;

/// Observable lifecycle of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowState {
    Open,
    Flushing,
    Closed,
}

impl WindowState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            OPEN => WindowState::Open,
            FLUSHING => WindowState::Flushing,
            _ => WindowState::Closed,
        }
    }
}

/// Result of offering a call to a window
pub(crate) enum Append<A, Z> {
    /// Buffered; the window is still open
    Accepted,
    /// Buffered and it completed the batch; the window is now closed
    Flushed,
    /// The window no longer accepts calls; the call is handed back
    Closed(PendingCall<A, Z>),
    /// The buffer is at capacity; the call is handed back
    Full(PendingCall<A, Z>),
}

pub(crate) struct BatchWindow<A: Arguments, Z> {
    id: u64,
    config: BatchConfig,
    state: AtomicU8,
    calls: Mutex<Vec<PendingCall<A, Z>>>,
    dispatcher: Arc<Dispatcher<A, Z>>,
    timer: Arc<Timer>,
}

impl<A, Z> BatchWindow<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    pub(crate) fn new(
        id: u64,
        config: BatchConfig,
        dispatcher: Arc<Dispatcher<A, Z>>,
        timer: Arc<Timer>,
    ) -> Self {
        tracing::trace!(
            window_id = id,
            window_ms = config.window.as_millis() as u64,
            max_batch_size = config.max_batch_size,
            "window opened"
        );
        Self {
            id,
            state: AtomicU8::new(OPEN),
            calls: Mutex::new(Vec::with_capacity(config.max_batch_size)),
            config,
            dispatcher,
            timer,
        }
    }

    /// A fresh open window bound to the same configuration and dispatcher
    pub(crate) fn successor(&self, id: u64) -> Self {
        Self::new(
            id,
            self.config.clone(),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.timer),
        )
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub(crate) fn dispatcher(&self) -> &Arc<Dispatcher<A, Z>> {
        &self.dispatcher
    }

    pub(crate) fn state(&self) -> WindowState {
        WindowState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Number of calls currently buffered
    pub(crate) fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Offer a call to this window.
    ///
    /// Reaching `max_batch_size` flushes synchronously inside this call. The
    /// first accepted call arms the window's single timer.
    pub(crate) fn append(self: &Arc<Self>, call: PendingCall<A, Z>) -> Append<A, Z> {
        let (batch, arm_timer) = {
            let mut calls = self.calls.lock();
            if self.state.load(Ordering::Acquire) != OPEN {
                return Append::Closed(call);
            }
            if calls.len() >= self.config.buffer_capacity {
                return Append::Full(call);
            }

            calls.push(call);
            if calls.len() >= self.config.max_batch_size {
                if self.begin_flush() {
                    (Some(std::mem::take(&mut *calls)), false)
                } else {
                    (None, false)
                }
            } else {
                (None, calls.len() == 1)
            }
        };

        if let Some(batch) = batch {
            self.hand_off(batch, FlushTrigger::Size);
            return Append::Flushed;
        }

        if arm_timer {
            let deadline = Instant::now() + self.config.window;
            let target: Arc<dyn Expire> = Arc::clone(self) as Arc<dyn Expire>;
            if !self.timer.schedule(deadline, target) {
                self.flush(FlushTrigger::Shutdown);
            }
        }

        Append::Accepted
    }

    /// Flush whatever is buffered if the window is still open.
    ///
    /// Returns the number of calls handed to the dispatcher; zero when
    /// another trigger already flushed the window or nothing was buffered.
    pub(crate) fn flush(&self, trigger: FlushTrigger) -> usize {
        let batch = {
            let mut calls = self.calls.lock();
            if !self.begin_flush() {
                return 0;
            }
            std::mem::take(&mut *calls)
        };
        let size = batch.len();
        self.hand_off(batch, trigger);
        size
    }

    fn begin_flush(&self) -> bool {
        self.state
            .compare_exchange(OPEN, FLUSHING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn hand_off(&self, batch: Vec<PendingCall<A, Z>>, trigger: FlushTrigger) {
        self.state.store(CLOSED, Ordering::Release);
        if !batch.is_empty() {
            batch_flushed(self.id, batch.len(), trigger);
            self.dispatcher.stats().record_flush(trigger);
            self.dispatcher.dispatch(self.id, batch);
        }
    }
}

impl<A, Z> Expire for BatchWindow<A, Z>
where
    A: Arguments,
    Z: Clone + Send + 'static,
{
    fn expire(&self, trigger: FlushTrigger) {
        self.flush(trigger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallHandle;
    use crate::dispatcher::BatchFn;
    use crate::pool::WorkerPool;
    use crate::stats::ExecutorStats;
    use delaybatch_core::BoxError;
    use std::sync::Barrier;
    use std::time::Duration;

    type Batches = Arc<Mutex<Vec<Vec<u32>>>>;

    fn window(config: BatchConfig) -> (Arc<BatchWindow<(u32,), u32>>, Batches, Arc<Timer>) {
        let batches: Batches = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&batches);
        let batch_fn: Arc<dyn BatchFn<(u32,), u32>> =
            Arc::new(move |(ids,): (Vec<u32>,)| -> Result<Vec<u32>, BoxError> {
                recorder.lock().push(ids.clone());
                Ok(ids)
            });
        let (window, timer) = window_with(config, batch_fn);
        (window, batches, timer)
    }

    fn window_with(
        config: BatchConfig,
        batch_fn: Arc<dyn BatchFn<(u32,), u32>>,
    ) -> (Arc<BatchWindow<(u32,), u32>>, Arc<Timer>) {
        let dispatcher = Arc::new(Dispatcher::new(
            batch_fn,
            WorkerPool::new(2).unwrap(),
            false,
            Arc::new(ExecutorStats::new()),
        ));
        let timer = Arc::new(Timer::start().unwrap());
        let window = Arc::new(BatchWindow::new(1, config, dispatcher, Arc::clone(&timer)));
        (window, timer)
    }

    fn submit(window: &Arc<BatchWindow<(u32,), u32>>, id: u32) -> (bool, Option<CallHandle<u32>>) {
        let (call, handle) = PendingCall::new((id,));
        match window.append(call) {
            Append::Accepted => (true, Some(handle)),
            Append::Flushed => (true, Some(handle)),
            Append::Closed(_) | Append::Full(_) => (false, None),
        }
    }

    #[test]
    fn test_size_trigger_closes_window() {
        let config = BatchConfig::new(Duration::from_secs(10), 3);
        let (window, _batches, _timer) = window(config);

        let (call, _h1) = PendingCall::new((1,));
        assert!(matches!(window.append(call), Append::Accepted));
        let (call, _h2) = PendingCall::new((2,));
        assert!(matches!(window.append(call), Append::Accepted));
        let (call, h3) = PendingCall::new((3,));
        assert!(matches!(window.append(call), Append::Flushed));
        assert_eq!(window.state(), WindowState::Closed);

        let (call, _h4) = PendingCall::new((4,));
        assert!(matches!(window.append(call), Append::Closed(_)));
        assert_eq!(h3.completion.wait_timeout(Duration::from_secs(5)).unwrap().unwrap(), Some(3));
    }

    #[test]
    fn test_time_trigger_flushes_partial_batch() {
        let config = BatchConfig::new(Duration::from_millis(20), 100);
        let (window, batches, _timer) = window(config);

        let (_, handle) = submit(&window, 7);
        let handle = handle.unwrap();
        submit(&window, 8);

        assert_eq!(
            handle.completion.wait_timeout(Duration::from_secs(5)).unwrap().unwrap(),
            Some(7)
        );
        assert_eq!(*batches.lock(), vec![vec![7, 8]]);
        assert_eq!(window.state(), WindowState::Closed);
    }

    #[test]
    fn test_window_closed_while_batch_in_flight() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (entered, gate) = (Arc::clone(&started), Arc::clone(&release));
        let batch_fn: Arc<dyn BatchFn<(u32,), u32>> =
            Arc::new(move |(ids,): (Vec<u32>,)| -> Result<Vec<u32>, BoxError> {
                entered.wait();
                gate.wait();
                Ok(ids)
            });
        let config = BatchConfig::new(Duration::from_millis(10), 100);
        let (window, _timer) = window_with(config, batch_fn);

        let (_, handle) = submit(&window, 4);
        started.wait();
        assert_eq!(window.state(), WindowState::Closed);
        release.wait();

        let outcome = handle.unwrap().completion.wait_timeout(Duration::from_secs(5));
        assert_eq!(outcome.unwrap().unwrap(), Some(4));
    }

    #[test]
    fn test_capacity_rejects_without_blocking() {
        let config = BatchConfig::builder()
            .window(Duration::from_secs(10))
            .max_batch_size(10)
            .buffer_capacity(2)
            .build()
            .unwrap();
        let (window, _batches, _timer) = window(config);

        assert!(submit(&window, 1).0);
        assert!(submit(&window, 2).0);
        let (call, _handle) = PendingCall::new((3,));
        assert!(matches!(window.append(call), Append::Full(_)));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_empty_window_flush_skips_dispatch() {
        let config = BatchConfig::new(Duration::from_millis(5), 10);
        let (window, batches, _timer) = window(config);

        assert_eq!(window.flush(FlushTrigger::Time), 0);
        assert_eq!(window.state(), WindowState::Closed);
        assert!(batches.lock().is_empty());
        assert_eq!(window.dispatcher().stats().snapshot().flushes, 0);
    }

    #[test]
    fn test_only_one_trigger_wins() {
        let config = BatchConfig::new(Duration::from_secs(10), 1000);
        let (window, batches, _timer) = window(config);
        for id in 0..50 {
            submit(&window, id);
        }

        let barrier = Arc::new(Barrier::new(8));
        let flushed: Vec<usize> = (0..8)
            .map(|_| {
                let window = Arc::clone(&window);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    window.flush(FlushTrigger::Time)
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert_eq!(flushed.iter().filter(|&&n| n > 0).count(), 1);
        assert_eq!(flushed.iter().sum::<usize>(), 50);

        let deadline = Instant::now() + Duration::from_secs(5);
        while batches.lock().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(batches.lock().len(), 1);
    }

    #[test]
    fn test_stopped_timer_flushes_on_append() {
        let config = BatchConfig::new(Duration::from_secs(10), 10);
        let (window, batches, timer) = window(config);
        timer.shutdown();

        let (_, handle) = submit(&window, 5);
        let outcome = handle.unwrap().completion.wait_timeout(Duration::from_secs(5));
        assert_eq!(outcome.unwrap().unwrap(), Some(5));
        assert_eq!(*batches.lock(), vec![vec![5]]);
    }

    #[test]
    fn test_successor_is_open_with_same_config() {
        let config = BatchConfig::new(Duration::from_millis(100), 2);
        let (window, _batches, _timer) = window(config.clone());
        window.flush(FlushTrigger::Shutdown);

        let next = window.successor(2);
        assert_eq!(next.id(), 2);
        assert_eq!(next.state(), WindowState::Open);
        assert_eq!(next.config(), &config);
    }
}
