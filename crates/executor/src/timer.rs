//! Deadline service that fires the time trigger of open windows.
//!
//! One thread per executor keeps a min-heap of deadlines and receives new
//! registrations over a crossbeam channel, sleeping in `recv_deadline` until
//! either the next deadline or the next registration. Entries hold the window
//! strongly so a window replaced by a reconfiguration still reaches its flush.
//! When the service stops, every outstanding entry is fired at once.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use delaybatch_core::{Error, Result, TIMER_THREAD_NAME};
use delaybatch_utils::FlushTrigger;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Something with a deadline-driven action
pub(crate) trait Expire: Send + Sync {
    fn expire(&self, trigger: FlushTrigger);
}

struct Entry {
    deadline: Instant,
    seq: u64,
    target: Arc<dyn Expire>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed so BinaryHeap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) struct Timer {
    sender: Mutex<Option<Sender<Entry>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    seq: AtomicU64,
}

impl Timer {
    pub(crate) fn start() -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Entry>();

        let handle = thread::Builder::new()
            .name(TIMER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
                loop {
                    let now = Instant::now();
                    while heap.peek().is_some_and(|entry| entry.deadline <= now) {
                        if let Some(entry) = heap.pop() {
                            entry.target.expire(FlushTrigger::Time);
                        }
                    }

                    let next = match heap.peek() {
                        Some(entry) => receiver.recv_deadline(entry.deadline),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match next {
                        Ok(entry) => heap.push(entry),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            // registrations already queued count as outstanding
                            heap.extend(receiver.try_iter());
                            for entry in heap.into_sorted_vec().into_iter().rev() {
                                entry.target.expire(FlushTrigger::Shutdown);
                            }
                            break;
                        }
                    }
                }
            })
            .map_err(|e| Error::worker_pool(format!("failed to spawn timer thread: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            seq: AtomicU64::new(0),
        })
    }

    /// Register `target` to expire at `deadline`.
    ///
    /// Returns `false` if the timer has stopped; the caller owns the expiry
    /// in that case.
    pub(crate) fn schedule(&self, deadline: Instant, target: Arc<dyn Expire>) -> bool {
        let seq = self.seq.fetch_add(1, atomic::Ordering::Relaxed);
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender
                .send(Entry {
                    deadline,
                    seq,
                    target,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Stop the service, firing every outstanding deadline immediately
    pub(crate) fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("timer thread terminated abnormally");
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
