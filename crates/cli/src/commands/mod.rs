use clap::Subcommand;
use delaybatch_core::Settings;

pub mod config;
pub mod simulate;

#[derive(Subcommand)]
pub enum Commands {
    /// Drive a steady request rate through an executor and report the outcome
    #[command(visible_alias = "sim")]
    Simulate {
        /// Requests started per second
        #[arg(long, default_value = "200")]
        requests_per_second: u32,

        /// Seconds to keep generating requests
        #[arg(long, default_value = "3")]
        duration_secs: u32,

        /// Simulated latency of one batch function invocation
        #[arg(long, default_value = "5")]
        batch_latency_ms: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    pub async fn execute(self, settings: Settings) -> eyre::Result<()> {
        match self {
            Commands::Simulate {
                requests_per_second,
                duration_secs,
                batch_latency_ms,
                json,
            } => {
                let plan = simulate::Plan {
                    requests_per_second,
                    duration_secs,
                    batch_latency_ms,
                };
                simulate::execute(settings, plan, json).await
            }
            Commands::Config { json } => config::execute(&settings, json),
        }
    }
}
