use promexec_daemon::{
    ChannelSink, LogSink, MetricsSink, ProcessSupervisor, ReceiverConfig, ScrapedBatch,
    SupervisorState,
};
use promexec_types::{PromexecError, PromexecResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const PRINT_BUFFER: usize = 16;

pub async fn run_receiver(
    config: ReceiverConfig,
    pid_file: Option<PathBuf>,
    print_metrics: bool,
    seed: Option<u64>,
) -> PromexecResult<()> {
    info!("Starting promexec v{}", env!("CARGO_PKG_VERSION"));

    if let Some(ref pid_path) = pid_file {
        std::fs::write(pid_path, std::process::id().to_string())
            .map_err(|e| PromexecError::Config(format!("Failed to write PID file: {}", e)))?;
        info!("PID file written: {:?}", pid_path);
    }

    let sink: Arc<dyn MetricsSink> = if print_metrics {
        let (sink, batches) = ChannelSink::new(PRINT_BUFFER);
        tokio::spawn(print_batches(batches));
        Arc::new(sink)
    } else {
        Arc::new(LogSink)
    };

    let mut supervisor = ProcessSupervisor::from_config(&config, sink)?;
    if let Some(seed) = seed {
        supervisor = supervisor.with_rng_seed(seed);
    }

    info!("{}", config.redacted());
    let handle = supervisor.start();

    let mut state = handle.watch_state();
    tokio::select! {
        signal = wait_for_shutdown() => {
            signal?;
            info!("Shutting down...");
        }
        _ = state.wait_for(|s| *s == SupervisorState::Terminated) => {}
    }

    let stats = handle.stats();
    let termination = handle.stop().await?;

    if let Some(ref pid_path) = pid_file {
        let _ = std::fs::remove_file(pid_path);
    }

    info!(
        "Supervision ended after {}s: {} launches, {} binds, {} unbinds",
        stats.uptime_secs(),
        stats.launches,
        stats.binds,
        stats.unbinds
    );

    if termination.is_abnormal() {
        warn!("Exporter supervision stopped abnormally: {:?}", termination);
    }
    termination.into_result()
}

async fn print_batches(mut batches: mpsc::Receiver<ScrapedBatch>) {
    while let Some(batch) = batches.recv().await {
        println!(
            "# job={} target={} scraped_at={}",
            batch.job_name,
            batch.target,
            batch.scraped_at.to_rfc3339()
        );
        print!("{}", batch.body);
        if !batch.body.ends_with('\n') {
            println!();
        }
    }
}

async fn wait_for_shutdown() -> PromexecResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let install = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                PromexecError::Internal(format!("Failed to install {} handler: {}", name, e))
            })
        };

        let mut sigterm = install(SignalKind::terminate(), "SIGTERM")?;
        let mut sigint = install(SignalKind::interrupt(), "SIGINT")?;

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| PromexecError::Internal(format!("Failed to install Ctrl+C handler: {}", e)))?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
