use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "promexec")]
#[command(version = BUILD_VERSION)]
#[command(about = "Runs a Prometheus exporter as a subprocess and scrapes it")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", env = "PROMEXEC_CONFIG", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Supervise the exporter and scrape it")]
    #[command(long_about = "Launch the configured exporter, scrape it on the configured interval and restart it with backoff whenever it exits.\n\nRuns until SIGTERM or SIGINT.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file")]
        pid_file: Option<PathBuf>,
        #[arg(long, help = "Print every scraped payload to stdout")]
        print_metrics: bool,
        #[arg(long, value_name = "SEED", help = "Seed the restart jitter for reproducible delays")]
        seed: Option<u64>,
    },

    #[command(about = "Validate the configuration and show the resolved command")]
    Check,

    #[command(about = "Show version information")]
    Version,
}
