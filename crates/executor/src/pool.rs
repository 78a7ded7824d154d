//! Fixed-size worker pool that runs batch dispatches.
//!
//! Jobs travel over a crossbeam channel to named worker threads. A panic in a
//! job is caught and logged so the worker survives it. Shutdown closes the
//! channel; workers drain what is already queued and exit.

use crossbeam::channel::{self, Receiver, Sender};
use delaybatch_core::{Error, Result, WORKER_THREAD_PREFIX};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolInner {
    id: u64,
    size: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to a pool of worker threads
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Spawn `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::configuration("worker pool needs at least one thread"));
        }

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);

        for index in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{WORKER_THREAD_PREFIX}-{id}-{index}"))
                .spawn(move || worker_loop(receiver))
                .map_err(|e| Error::worker_pool(format!("failed to spawn worker thread: {e}")))?;
            workers.push(handle);
        }

        tracing::debug!(pool_id = id, threads, "worker pool started");

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                size: threads,
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
            }),
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Queue a job; fails once the pool has been shut down
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let sender = self.inner.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender
                .send(Box::new(job))
                .map_err(|_| Error::worker_pool("worker pool channel is disconnected")),
            None => Err(Error::worker_pool("worker pool is shut down")),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    /// Whether both handles refer to the same pool
    pub fn same_pool(&self, other: &WorkerPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    ///
    /// When called from one of this pool's own workers that worker is not
    /// joined; it exits after its current job.
    pub fn shutdown(&self) {
        let sender = self.inner.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let current = thread::current().id();
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::error!(pool_id = self.inner.id, "worker thread terminated abnormally");
            }
        }
        tracing::debug!(pool_id = self.inner.id, "worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.inner.id)
            .field("size", &self.inner.size)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            tracing::error!(
                panic = %panic_message(panic.as_ref()),
                "worker job panicked"
            );
        }
    }
}

/// Best-effort rendering of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
