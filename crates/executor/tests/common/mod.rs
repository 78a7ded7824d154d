#![allow(dead_code)]

use delaybatch_executor::{BoxError, DelayedBatchExecutor, ExecutorBuilder};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Lookup = DelayedBatchExecutor<(u32,), String>;

/// Every batch the batch function was invoked with, in invocation order
#[derive(Clone, Default)]
pub struct BatchLog {
    batches: Arc<Mutex<Vec<Vec<u32>>>>,
}

impl BatchLog {
    pub fn record(&self, ids: &[u32]) {
        self.batches.lock().push(ids.to_vec());
    }

    pub fn batches(&self) -> Vec<Vec<u32>> {
        self.batches.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn all_ids(&self) -> Vec<u32> {
        self.batches.lock().iter().flatten().copied().collect()
    }
}

pub fn render(id: u32) -> String {
    format!("value-{id}")
}

/// Builder for an executor whose batch function renders every id and logs
/// the batches it receives
pub fn lookup(log: &BatchLog) -> ExecutorBuilder<(u32,), String> {
    let log = log.clone();
    Lookup::builder(
        move |(ids,): (Vec<u32>,)| -> Result<Vec<String>, BoxError> {
            log.record(&ids);
            Ok(ids.into_iter().map(render).collect())
        },
    )
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
