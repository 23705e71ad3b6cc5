use super::commands::Cli;
use promexec_daemon::LoggingConfig;
use promexec_types::{PromexecError, PromexecResult};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".promexec").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/promexec/config.toml"))
}

fn filter_directive(cli: &Cli, logging: &LoggingConfig) -> String {
    if cli.quiet {
        return "warn".to_string();
    }
    match cli.verbose {
        0 => logging.level.to_string(),
        1 => "info,promexec_daemon=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Flags on the command line win over the `[logging]` section; `RUST_LOG` wins over both.
pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> PromexecResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli, logging)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let log_file = cli.log_file.as_ref().or(logging.file.as_ref());

    match (log_file, logging.json) {
        (Some(path), json) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    PromexecError::Config(format!("Failed to open log file {:?}: {}", path, e))
                })?;
            let writer = std::sync::Mutex::new(file);
            if json {
                subscriber
                    .with(fmt::layer().json().with_writer(writer).with_ansi(false))
                    .init();
            } else {
                subscriber
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .init();
            }
        }
        (None, true) => subscriber.with(fmt::layer().json()).init(),
        (None, false) => subscriber
            .with(fmt::layer().with_target(cli.verbose >= 2))
            .init(),
    }

    Ok(())
}
