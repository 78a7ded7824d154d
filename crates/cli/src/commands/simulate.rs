//! Parallel request simulation.
//!
//! Every second `requests_per_second` client tasks start, each waiting a
//! random delay inside that second before submitting one call. The batch
//! function echoes an identifier built from the call's arguments, so every
//! client can check it received its own result.

use delaybatch_core::{BoxError, Settings};
use delaybatch_executor::{DelayedBatchExecutor, StatsSnapshot};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct Plan {
    pub requests_per_second: u32,
    pub duration_secs: u32,
    pub batch_latency_ms: u64,
}

impl Plan {
    fn expected(&self) -> u64 {
        u64::from(self.requests_per_second) * u64::from(self.duration_secs)
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub expected: u64,
    pub submitted: u64,
    pub completed: u64,
    pub mismatched: u64,
    pub failed: u64,
    pub unfinished: usize,
    pub max_latency_ms: u64,
    pub stats: StatsSnapshot,
}

impl Report {
    fn is_clean(&self) -> bool {
        self.completed == self.expected
            && self.mismatched == 0
            && self.failed == 0
            && self.unfinished == 0
    }
}

#[derive(Default)]
struct Tally {
    submitted: AtomicU64,
    completed: AtomicU64,
    mismatched: AtomicU64,
    failed: AtomicU64,
    max_latency_ms: AtomicU64,
    in_flight: Mutex<HashSet<String>>,
}

type Simulated = DelayedBatchExecutor<(u64, u32), String>;

fn identifier(timestamp: u64, client: u32) -> String {
    format!("{timestamp}-{client}")
}

pub async fn execute(settings: Settings, plan: Plan, json: bool) -> eyre::Result<()> {
    tracing::info!(
        requests_per_second = plan.requests_per_second,
        duration_secs = plan.duration_secs,
        window_ms = settings.batch.window.as_millis() as u64,
        max_batch_size = settings.batch.max_batch_size,
        "starting simulation"
    );

    let report = run(settings, &plan).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_clean() {
        eyre::bail!(
            "simulation finished with {} unfinished, {} mismatched and {} failed calls",
            report.unfinished,
            report.mismatched,
            report.failed
        );
    }
    Ok(())
}

async fn run(settings: Settings, plan: &Plan) -> eyre::Result<Report> {
    let latency = Duration::from_millis(plan.batch_latency_ms);
    let executor: Arc<Simulated> = Arc::new(
        Simulated::builder(
            move |(timestamps, clients): (Vec<u64>, Vec<u32>)| -> Result<Vec<String>, BoxError> {
                std::thread::sleep(latency);
                Ok(timestamps
                    .into_iter()
                    .zip(clients)
                    .map(|(timestamp, client)| identifier(timestamp, client))
                    .collect())
            },
        )
        .settings(&settings)
        .build()?,
    );
    let tally = Arc::new(Tally::default());

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut clients = Vec::with_capacity(plan.expected() as usize);
    for second in 0..plan.duration_secs {
        ticker.tick().await;
        for client in 0..plan.requests_per_second {
            clients.push(tokio::spawn(client_call(
                Arc::clone(&executor),
                Arc::clone(&tally),
                client,
            )));
        }
        tracing::info!(second, requests = plan.requests_per_second, "requests started");
    }

    for joined in join_all(clients).await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "client task failed");
            tally.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    let stats = executor.stats();
    let closing = Arc::clone(&executor);
    tokio::task::spawn_blocking(move || closing.close()).await?;

    let unfinished = tally.in_flight.lock().len();
    Ok(Report {
        expected: plan.expected(),
        submitted: tally.submitted.load(Ordering::Relaxed),
        completed: tally.completed.load(Ordering::Relaxed),
        mismatched: tally.mismatched.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        unfinished,
        max_latency_ms: tally.max_latency_ms.load(Ordering::Relaxed),
        stats,
    })
}

async fn client_call(executor: Arc<Simulated>, tally: Arc<Tally>, client: u32) {
    tokio::time::sleep(Duration::from_millis(fastrand::u64(0..1000))).await;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let id = identifier(timestamp, client);
    tally.in_flight.lock().insert(id.clone());
    tally.submitted.fetch_add(1, Ordering::Relaxed);

    let started = Instant::now();
    let outcome = match executor.execute_async((timestamp, client)) {
        Ok(future) => future.await,
        Err(e) => Err(e),
    };
    let elapsed = started.elapsed().as_millis() as u64;
    tally.max_latency_ms.fetch_max(elapsed, Ordering::Relaxed);

    match outcome {
        Ok(Some(value)) if value == id => {
            tally.completed.fetch_add(1, Ordering::Relaxed);
            tally.in_flight.lock().remove(&id);
        }
        Ok(value) => {
            tracing::warn!(expected = %id, received = ?value, "call received another caller's result");
            tally.mismatched.fetch_add(1, Ordering::Relaxed);
            tally.in_flight.lock().remove(&id);
        }
        Err(e) => {
            tracing::warn!(call = %id, error = %e, "call failed");
            tally.failed.fetch_add(1, Ordering::Relaxed);
            tally.in_flight.lock().remove(&id);
        }
    }
}

fn print_report(report: &Report) {
    println!("expected requests:   {}", report.expected);
    println!("submitted requests:  {}", report.submitted);
    println!("completed requests:  {}", report.completed);
    println!("mismatched results:  {}", report.mismatched);
    println!("failed requests:     {}", report.failed);
    println!("unfinished requests: {}", report.unfinished);
    println!("max latency:         {} ms", report.max_latency_ms);
    println!(
        "batches:             {} ({} by size, {} by time)",
        report.stats.flushes, report.stats.size_flushes, report.stats.time_flushes
    );
    println!("deduplicated calls:  {}", report.stats.deduplicated);
}
