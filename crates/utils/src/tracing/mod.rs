use delaybatch_core::DELAYBATCH_LOG_VAR;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Why a window was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The window reached its maximum batch size
    Size,
    /// The window's timer elapsed
    Time,
    /// The executor was shut down
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Time => "time",
            FlushTrigger::Shutdown => "shutdown",
        }
    }
}

/// Initialize the tracing system
///
/// The filter is read from `DELAYBATCH_LOG`, then `RUST_LOG`, defaulting to
/// `info`. Output is a compact formatter on stderr.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = build_filter();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_names(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_filter() -> EnvFilter {
    std::env::var(DELAYBATCH_LOG_VAR)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span covering one batch dispatch
pub fn batch_span(window_id: u64, size: usize) -> Span {
    span!(Level::DEBUG, "batch", window_id = %window_id, size = %size)
}

/// Emit a structured event for a window flush
pub fn batch_flushed(window_id: u64, size: usize, trigger: FlushTrigger) {
    debug!(
        window_id = %window_id,
        size = %size,
        trigger = %trigger.as_str(),
        "batch_flushed"
    );
}

/// Emit a structured event for a completed dispatch
pub fn batch_completed(window_id: u64, unique: usize, duplicates: usize, elapsed: Duration) {
    debug!(
        window_id = %window_id,
        unique = %unique,
        duplicates = %duplicates,
        duration_ms = %elapsed.as_millis(),
        "batch_completed"
    );
}

/// Emit a structured event for a failed batch
pub fn batch_failed(window_id: u64, calls: usize, error: &dyn std::fmt::Display) {
    warn!(
        window_id = %window_id,
        calls = %calls,
        error = %error,
        "batch_failed"
    );
}

/// Emit a structured event for a rejected submission
pub fn call_rejected(window_id: u64, capacity: usize) {
    warn!(
        window_id = %window_id,
        capacity = %capacity,
        "call_rejected"
    );
}

/// Emit a structured event for a configuration swap
pub fn reconfigured(window_id: u64, window: Duration, max_batch_size: usize) {
    info!(
        window_id = %window_id,
        window_ms = %window.as_millis(),
        max_batch_size = %max_batch_size,
        "reconfigured"
    );
}
