use super::commands::OutputFormat;
use promexec_daemon::{port, RedactedConfig, ReceiverConfig};
use promexec_types::{PromexecError, PromexecResult};
use serde::Serialize;

#[derive(Serialize)]
struct CheckReport {
    config: RedactedConfig,
    sample_port: u16,
    command: String,
}

/// Validates the loaded config and shows the command as it would be launched.
///
/// With a dynamic port a real port is allocated so the check also proves one is available.
pub fn run_check(config: &ReceiverConfig, format: OutputFormat) -> PromexecResult<()> {
    config.validate()?;

    let sample_port = if config.port == 0 {
        port::allocate()?
    } else {
        config.port
    };
    let command = config.subprocess_spec()?.materialize(sample_port).command;

    let report = CheckReport {
        config: config.redacted(),
        sample_port,
        command,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| PromexecError::Internal(format!("Failed to render report: {}", e)))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", report.config);
            println!();
            println!("Launch command (port {}): {}", report.sample_port, report.command);
            println!("\x1b[38;5;46m[OK]\x1b[0m Configuration is valid");
        }
    }

    Ok(())
}
