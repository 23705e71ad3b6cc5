mod cli;

use clap::Parser;
use cli::{default_config_path, init_logging, run_check, run_receiver, show_version, Cli, Commands};
use promexec_daemon::{ConfigSource, ReceiverConfig};
use promexec_types::PromexecResult;
use tracing::info;

#[tokio::main]
async fn main() -> PromexecResult<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        show_version();
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (config, source) = ReceiverConfig::load_with_source(&config_path)?;

    init_logging(&cli, &config.logging)?;

    match source {
        ConfigSource::File(path) => info!("Loaded configuration from {:?}", path),
        ConfigSource::Defaults => {
            info!("Config file {:?} not found, using defaults", config_path)
        }
    }

    match cli.command {
        Commands::Run {
            pid_file,
            print_metrics,
            seed,
        } => {
            run_receiver(config, pid_file, print_metrics, seed).await?;
        }
        Commands::Check => {
            run_check(&config, cli.format)?;
        }
        Commands::Version => show_version(),
    }

    Ok(())
}
