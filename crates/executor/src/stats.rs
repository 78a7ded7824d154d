//! Cumulative counters for observability. None of these affect behavior.

use delaybatch_utils::FlushTrigger;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ExecutorStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    flushes: AtomicU64,
    size_flushes: AtomicU64,
    time_flushes: AtomicU64,
    shutdown_flushes: AtomicU64,
    batches_failed: AtomicU64,
    deduplicated: AtomicU64,
    reconfigurations: AtomicU64,
}

/// Point-in-time copy of [`ExecutorStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Calls accepted by `submit`
    pub submitted: u64,
    /// Calls refused because a window buffer was full
    pub rejected: u64,
    /// Non-empty flushes, whatever triggered them
    pub flushes: u64,
    pub size_flushes: u64,
    pub time_flushes: u64,
    pub shutdown_flushes: u64,
    /// Batches whose calls all received an error
    pub batches_failed: u64,
    /// Calls answered from a duplicate's representative
    pub deduplicated: u64,
    /// Reconfigurations that took effect
    pub reconfigurations: u64,
}

impl ExecutorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        let counter = match trigger {
            FlushTrigger::Size => &self.size_flushes,
            FlushTrigger::Time => &self.time_flushes,
            FlushTrigger::Shutdown => &self.shutdown_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deduplicated(&self, count: usize) {
        self.deduplicated.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_reconfiguration(&self) {
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            size_flushes: self.size_flushes.load(Ordering::Relaxed),
            time_flushes: self.time_flushes.load(Ordering::Relaxed),
            shutdown_flushes: self.shutdown_flushes.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
        }
    }
}
