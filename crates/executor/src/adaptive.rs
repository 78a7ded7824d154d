//! Load-driven batch sizing.
//!
//! Counts submissions and, once per check interval, derives the batch size
//! that would keep the batch function near a target invocation rate:
//! `observed calls per second / target batches per second`, clamped to
//! `[1, max_batch_size]`. The coordinator applies the result through a normal
//! reconfiguration.

use delaybatch_core::{Error, Result, MAX_BATCH_SIZE};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Policy for adjusting `max_batch_size` to the observed submission rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSizing {
    /// How often the rate is re-evaluated
    pub check_interval: Duration,
    /// Desired batch function invocations per second
    pub target_batches_per_second: u64,
    /// Upper bound for the derived batch size
    pub max_batch_size: usize,
}

impl Default for AdaptiveSizing {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            target_batches_per_second: 10,
            max_batch_size: 256,
        }
    }
}

impl AdaptiveSizing {
    pub fn new(
        check_interval: Duration,
        target_batches_per_second: u64,
        max_batch_size: usize,
    ) -> Self {
        Self {
            check_interval,
            target_batches_per_second,
            max_batch_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(Error::configuration(
                "adaptive check interval must be greater than zero",
            ));
        }
        if self.target_batches_per_second == 0 {
            return Err(Error::configuration(
                "adaptive target batches per second must be at least 1",
            ));
        }
        if self.max_batch_size < 1 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(Error::configuration(format!(
                "adaptive max batch size must be in range [1,{MAX_BATCH_SIZE}], got {}",
                self.max_batch_size
            )));
        }
        Ok(())
    }

    /// Batch size for `calls` observed over `elapsed`
    pub fn size_for(&self, calls: u64, elapsed: Duration) -> usize {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return 1;
        }
        let per_second = calls as f64 / seconds;
        let size = (per_second / self.target_batches_per_second as f64) as usize;
        size.clamp(1, self.max_batch_size)
    }
}

struct Checkpoint {
    at: Instant,
    calls: u64,
}

/// Running state of an [`AdaptiveSizing`] policy
pub(crate) struct AdaptiveSizer {
    policy: AdaptiveSizing,
    calls: AtomicU64,
    checkpoint: Mutex<Checkpoint>,
}

impl AdaptiveSizer {
    pub(crate) fn new(policy: AdaptiveSizing) -> Self {
        Self {
            policy,
            calls: AtomicU64::new(0),
            checkpoint: Mutex::new(Checkpoint {
                at: Instant::now(),
                calls: 0,
            }),
        }
    }

    pub(crate) fn policy(&self) -> &AdaptiveSizing {
        &self.policy
    }

    /// Count one submission; returns a new batch size when an interval closed
    pub(crate) fn observe(&self) -> Option<usize> {
        let total = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        self.observe_at(Instant::now(), total)
    }

    fn observe_at(&self, now: Instant, total: u64) -> Option<usize> {
        // another submitter is already evaluating this interval
        let mut checkpoint = self.checkpoint.try_lock()?;
        let elapsed = now.saturating_duration_since(checkpoint.at);
        if elapsed <= self.policy.check_interval {
            return None;
        }

        let size = self
            .policy
            .size_for(total.saturating_sub(checkpoint.calls), elapsed);
        tracing::debug!(
            calls = total.saturating_sub(checkpoint.calls),
            elapsed_ms = elapsed.as_millis() as u64,
            size,
            "adaptive batch size evaluated"
        );
        *checkpoint = Checkpoint { at: now, calls: total };
        Some(size)
    }
}
