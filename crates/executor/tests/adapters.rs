use delaybatch_executor::{BoxError, DelayedBatchExecutor, Error, Outcome};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{eventually, lookup, render, BatchLog};

const WAIT: Duration = Duration::from_secs(5);

fn failing(max_batch_size: usize) -> DelayedBatchExecutor<(u32,), String> {
    DelayedBatchExecutor::new(
        Duration::from_secs(10),
        max_batch_size,
        |_: (Vec<u32>,)| -> Result<Vec<String>, BoxError> { Err("backend unavailable".into()) },
    )
    .unwrap()
}

/// Property: one batch error reaches blocking, future and reactive callers
/// alike, and nobody hangs
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_error_fans_out_to_every_adapter() {
    let executor = failing(3);

    let observed: Arc<Mutex<Vec<Outcome<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    executor
        .execute_reactive((1,))
        .unwrap()
        .subscribe(move |outcome| sink.lock().push(outcome));

    let future = executor.execute_async((2,)).unwrap();
    let blocking = executor.submit((3,)).unwrap();

    let from_future = tokio::time::timeout(WAIT, future).await.unwrap().unwrap_err();
    let from_blocking = blocking.wait_timeout(WAIT).unwrap_err();
    assert!(eventually(WAIT, || observed.lock().len() == 1));
    let from_reactive = observed.lock()[0].clone().unwrap_err();

    for error in [&from_future, &from_blocking, &from_reactive] {
        assert!(error.is_batch_failure());
        assert!(error.to_string().contains("backend unavailable"));
    }
    assert!(from_future.same_batch_failure(&from_blocking));
    assert!(from_blocking.same_batch_failure(&from_reactive));
    assert_eq!(executor.stats().batches_failed, 1);
}

#[test]
fn panicking_batch_function_fails_calls_and_keeps_pool() {
    let executor: DelayedBatchExecutor<(u32,), u32> = DelayedBatchExecutor::new(
        Duration::from_secs(10),
        1,
        |(ids,): (Vec<u32>,)| -> Result<Vec<u32>, BoxError> {
            if ids[0] == 0 {
                panic!("division by zero");
            }
            Ok(ids.into_iter().map(|id| 100 / id).collect())
        },
    )
    .unwrap();

    let err = executor.execute_blocking((0,)).unwrap_err();
    assert!(err.is_batch_failure());
    assert!(err.to_string().contains("division by zero"));

    assert_eq!(executor.execute_blocking((4,)).unwrap(), Some(25));
}

#[tokio::test]
async fn future_resolves_to_own_result() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(10))
        .max_batch_size(10)
        .build()
        .unwrap();

    let futures: Vec<_> = (0..5).map(|id| executor.execute_async((id,)).unwrap()).collect();
    let values = futures::future::join_all(futures).await;
    for (id, value) in values.into_iter().enumerate() {
        assert_eq!(value.unwrap(), Some(render(id as u32)));
    }
    assert_eq!(log.len(), 1);
}

#[test]
fn future_can_be_polled_synchronously() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(10))
        .max_batch_size(10)
        .build()
        .unwrap();

    let future = executor.execute_async((8,)).unwrap();
    assert_eq!(future.get_timeout(WAIT).unwrap(), Some(render(8)));
    assert!(future.is_done());
    assert_eq!(future.get().unwrap(), Some(render(8)));
}

/// Property: a consumer timeout does not cancel the call
#[test]
fn blocking_timeout_leaves_call_running() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(100))
        .max_batch_size(10)
        .build()
        .unwrap();

    let handle = executor.submit((42,)).unwrap();
    let err = handle.wait_timeout(Duration::from_millis(5)).unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    assert_eq!(handle.wait_timeout(WAIT).unwrap(), Some(render(42)));
    assert_eq!(log.all_ids(), vec![42]);
}

#[test]
fn execute_blocking_timeout_reports_timeout() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(200))
        .max_batch_size(10)
        .build()
        .unwrap();

    let err = executor
        .execute_blocking_timeout((1,), Duration::from_millis(5))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(eventually(WAIT, || log.len() == 1));
}

#[test]
fn unbounded_timeout_waits_for_outcome() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(10))
        .max_batch_size(10)
        .build()
        .unwrap();

    assert_eq!(
        executor.execute_blocking_timeout((1,), Duration::MAX).unwrap(),
        Some(render(1))
    );
    let handle = executor.submit((2,)).unwrap();
    assert_eq!(handle.wait_timeout(Duration::MAX).unwrap(), Some(render(2)));
    let future = executor.execute_async((3,)).unwrap();
    assert_eq!(future.get_timeout(Duration::MAX).unwrap(), Some(render(3)));
}

/// Property: subscribing after completion still delivers the outcome
#[test]
fn late_reactive_subscriber_receives_outcome() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_secs(10))
        .max_batch_size(1)
        .build()
        .unwrap();

    let single = executor.execute_reactive((5,)).unwrap();
    assert!(eventually(WAIT, || single.handle().is_done()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let sink = Arc::clone(&seen);
        single.subscribe_with(
            move |value| sink.lock().push(value),
            |error| panic!("unexpected error: {error}"),
        );
    }
    assert_eq!(*seen.lock(), vec![Some(render(5)), Some(render(5))]);
}

#[tokio::test]
async fn reactive_stream_yields_single_item() {
    let log = BatchLog::default();
    let executor = lookup(&log)
        .window(Duration::from_millis(5))
        .max_batch_size(10)
        .build()
        .unwrap();

    let single = executor.execute_reactive((6,)).unwrap();
    let lengths = single.map(|value| value.map(|s| s.len()));
    let items: Vec<_> = lengths.into_stream().collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap(), &Some(render(6).len()));
}
