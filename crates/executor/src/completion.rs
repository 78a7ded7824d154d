//! Write-once completion cell shared between a pending call and its consumers.
//!
//! Blocking waiters, async wakers and registered continuations are all
//! served from one mutex, so a consumer that attaches after completion always
//! observes the stored value and a continuation can never miss the signal.

use parking_lot::{Condvar, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

type Continuation<T> = Box<dyn FnOnce(T) + Send + 'static>;

struct State<T> {
    value: Option<T>,
    wakers: Vec<Option<Waker>>,
    continuations: Vec<Continuation<T>>,
}

/// A value that is set exactly once and can be awaited in several styles
pub struct Completion<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T: Clone + Send + 'static> Completion<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                value: None,
                wakers: Vec::new(),
                continuations: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Store the value and wake every consumer.
    ///
    /// Returns `false` without touching the stored value if the cell was
    /// already completed.
    pub fn complete(&self, value: T) -> bool {
        let (wakers, continuations) = {
            let mut state = self.state.lock();
            if state.value.is_some() {
                return false;
            }
            state.value = Some(value.clone());
            (
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.continuations),
            )
        };

        self.ready.notify_all();
        for waker in wakers.into_iter().flatten() {
            waker.wake();
        }
        for continuation in continuations {
            continuation(value.clone());
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().value.is_some()
    }

    /// The stored value, if any, without blocking
    pub fn peek(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    /// Block the calling thread until the value is available
    pub fn wait(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = &state.value {
                return value.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    /// Block for at most `timeout`; `None` if the value did not arrive in time
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut state = self.state.lock();
        loop {
            if let Some(value) = &state.value {
                return Some(value.clone());
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.value.clone();
            }
        }
    }

    /// Run `continuation` with the value, immediately if it is already stored
    pub fn on_complete(&self, continuation: impl FnOnce(T) + Send + 'static) {
        let mut state = self.state.lock();
        match &state.value {
            Some(value) => {
                let value = value.clone();
                drop(state);
                continuation(value);
            }
            None => state.continuations.push(Box::new(continuation)),
        }
    }

    /// Poll from a future, registering the task's waker when not ready.
    ///
    /// `slot` identifies the polling future across calls: each future keeps
    /// at most one waker here, replaced when it is polled from another task.
    pub fn poll_value(&self, cx: &mut Context<'_>, slot: &mut Option<usize>) -> Poll<T> {
        let mut state = self.state.lock();
        if let Some(value) = &state.value {
            return Poll::Ready(value.clone());
        }
        let waker = cx.waker();
        match *slot {
            Some(index) => match &mut state.wakers[index] {
                Some(stored) if stored.will_wake(waker) => {}
                stored => *stored = Some(waker.clone()),
            },
            None => {
                *slot = Some(state.wakers.len());
                state.wakers.push(Some(waker.clone()));
            }
        }
        Poll::Pending
    }

    /// Drop the waker registered under `slot` by [`Completion::poll_value`]
    pub fn release_waker(&self, slot: usize) {
        if let Some(stored) = self.state.lock().wakers.get_mut(slot) {
            *stored = None;
        }
    }

    #[cfg(test)]
    fn registered_wakers(&self) -> usize {
        self.state.lock().wakers.iter().flatten().count()
    }
}

impl<T: Clone + Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Completion")
            .field("complete", &state.value.is_some())
            .field("continuations", &state.continuations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_complete_only_once() {
        let cell = Completion::new();
        assert!(cell.complete(1));
        assert!(!cell.complete(2));
        assert_eq!(cell.peek(), Some(1));
    }

    #[test]
    fn test_wait_across_threads() {
        let cell = Arc::new(Completion::new());
        let writer = Arc::clone(&cell);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.complete("done".to_string());
        });
        assert_eq!(cell.wait(), "done");
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let cell: Completion<u8> = Completion::new();
        let started = Instant::now();
        assert_eq!(cell.wait_timeout(Duration::from_millis(30)), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(!cell.is_complete());
    }

    #[test]
    fn test_wait_timeout_without_deadline() {
        let cell = Arc::new(Completion::new());
        let writer = Arc::clone(&cell);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.complete(3_u8);
        });
        assert_eq!(cell.wait_timeout(Duration::MAX), Some(3));
        handle.join().unwrap();
    }

    #[test]
    fn test_repolling_keeps_one_waker() {
        let cell: Completion<u8> = Completion::new();
        let mut slot = None;
        for _ in 0..5 {
            let waker = futures::task::noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(cell.poll_value(&mut cx, &mut slot).is_pending());
        }
        assert_eq!(slot, Some(0));
        assert_eq!(cell.registered_wakers(), 1);

        cell.release_waker(0);
        assert_eq!(cell.registered_wakers(), 0);
        assert!(cell.complete(1));
    }

    #[test]
    fn test_late_continuation_fires_immediately() {
        let cell = Completion::new();
        cell.complete(7_u32);
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        cell.on_complete(move |v| sink.store(v as usize, Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_early_continuations_fire_once_each() {
        let cell = Completion::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            cell.on_complete(move |_: u8| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        cell.complete(1);
        cell.complete(2);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_racing_subscribers_all_observe_value() {
        for _ in 0..50 {
            let cell = Arc::new(Completion::new());
            let hits = Arc::new(AtomicUsize::new(0));
            let subscriber = {
                let cell = Arc::clone(&cell);
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let hits = Arc::clone(&hits);
                        cell.on_complete(move |_: u8| {
                            hits.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            };
            cell.complete(9);
            subscriber.join().unwrap();
            assert_eq!(hits.load(Ordering::SeqCst), 10);
        }
    }
}
