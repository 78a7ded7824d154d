use clap::Parser;
use delaybatch_core::{CliOverrides, Settings, SettingsLoader};
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "delaybatch")]
#[command(about = "Exercise and inspect delayed batch executors", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/delaybatch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Window duration in milliseconds
    #[arg(long, global = true)]
    window_ms: Option<u64>,

    /// Calls that force a flush
    #[arg(long, global = true)]
    max_batch_size: Option<usize>,

    /// Calls a window buffers before rejecting submissions
    #[arg(long, global = true)]
    buffer_capacity: Option<usize>,

    /// Size of the worker pool
    #[arg(long, global = true)]
    worker_threads: Option<usize>,

    /// Coalesce equal calls within a batch
    #[arg(long, global = true)]
    deduplicate: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn settings(&self) -> delaybatch_core::Result<Settings> {
        let settings = match &self.config {
            Some(path) => SettingsLoader::load_with_file(path)?,
            None => SettingsLoader::load()?,
        };

        SettingsLoader::apply_cli_overrides(
            settings,
            CliOverrides {
                window_ms: self.window_ms,
                max_batch_size: self.max_batch_size,
                buffer_capacity: self.buffer_capacity,
                worker_threads: self.worker_threads,
                deduplicate: self.deduplicate,
            },
        )
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    if let Err(e) = delaybatch_utils::init() {
        eprintln!("failed to initialize logging: {e}");
    }

    let cli = Cli::parse();
    let settings = cli.settings()?;
    cli.command.execute(settings).await
}
