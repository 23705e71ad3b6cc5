use parking_lot::RwLock;
use promexec_types::{PromexecError, PromexecResult, SubprocessError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::cancellation::{ShutdownListener, ShutdownSignal};
use super::stats::SupervisorStats;
use super::types::{CrashState, RunResult, SupervisorState, Termination};
use crate::config::ReceiverConfig;
use crate::port;
use crate::scrape::{
    BoundTarget, HttpScrapeReceiverFactory, MetricsSink, ScrapeReceiverFactory, ScrapeTargetBinder,
};
use crate::subprocess::{CommandRunner, MaterializedSpec, ProcessRunner, SubprocessSpec};

pub type PortAllocator = fn() -> PromexecResult<u16>;

/// Loop state together with whatever the next transition needs.
enum Phase {
    Idle,
    Binding,
    Running {
        bound: BoundTarget,
        spec: MaterializedSpec,
    },
    Stopping {
        bound: BoundTarget,
        run: Option<RunResult>,
    },
    Delaying(Duration),
    Terminated(Termination),
}

impl Phase {
    fn state(&self) -> SupervisorState {
        match self {
            Phase::Idle => SupervisorState::Idle,
            Phase::Binding => SupervisorState::Binding,
            Phase::Running { .. } => SupervisorState::Running,
            Phase::Stopping { .. } => SupervisorState::Stopping,
            Phase::Delaying(_) => SupervisorState::Delaying,
            Phase::Terminated(_) => SupervisorState::Terminated,
        }
    }
}

/// Keeps one exporter process and one scrape receiver alive, restarting both with backoff.
///
/// Each iteration binds a scrape receiver to the port, launches the
/// subprocess, waits for it to exit, unbinds the receiver and sleeps for the
/// backoff delay. Subprocess failures are restarted forever; port allocation,
/// bind and unbind failures end the loop.
pub struct ProcessSupervisor {
    job: String,
    spec: SubprocessSpec,
    port: u16,
    policy: BackoffPolicy,
    runner: Arc<dyn ProcessRunner>,
    binder: ScrapeTargetBinder,
    allocator: PortAllocator,
    rng: StdRng,
    shutdown: ShutdownSignal,
    state_tx: watch::Sender<SupervisorState>,
    stats: Arc<RwLock<SupervisorStats>>,
}

impl ProcessSupervisor {
    pub fn new(
        config: &ReceiverConfig,
        runner: Arc<dyn ProcessRunner>,
        factory: Arc<dyn ScrapeReceiverFactory>,
        sink: Arc<dyn MetricsSink>,
    ) -> PromexecResult<Self> {
        config.validate()?;
        let spec = config.subprocess_spec()?;

        let binder = ScrapeTargetBinder::new(factory, sink, config.scrape_target_config())
            .with_timeouts(config.scrape.start_timeout(), config.scrape.stop_timeout());

        let job = config.job_name().to_string();
        let (state_tx, _) = watch::channel(SupervisorState::Idle);

        Ok(Self {
            stats: Arc::new(RwLock::new(SupervisorStats::new(job.clone()))),
            job,
            spec,
            port: config.port,
            policy: config.restart.backoff_policy(),
            runner,
            binder,
            allocator: port::allocate,
            rng: StdRng::from_entropy(),
            shutdown: ShutdownSignal::new(),
            state_tx,
        })
    }

    /// Supervisor wired to a real subprocess and the HTTP scrape receiver.
    pub fn from_config(config: &ReceiverConfig, sink: Arc<dyn MetricsSink>) -> PromexecResult<Self> {
        let runner = CommandRunner::new(config.job_name()).with_grace(config.restart.termination_grace());
        Self::new(config, Arc::new(runner), Arc::new(HttpScrapeReceiverFactory), sink)
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_port_allocator(mut self, allocator: PortAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn start(self) -> SupervisorHandle {
        let shutdown = self.shutdown.clone();
        let state = self.state_tx.subscribe();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run());

        SupervisorHandle {
            shutdown,
            state,
            stats,
            task,
        }
    }

    pub async fn run(mut self) -> Termination {
        let mut listener = self.shutdown.subscribe();
        let mut crash = CrashState::default();
        let mut phase = Phase::Idle;

        info!(
            "Supervising '{}' for job '{}' (port: {})",
            self.spec.command(),
            self.job,
            if self.port == 0 { "dynamic".to_string() } else { self.port.to_string() }
        );

        loop {
            self.publish(phase.state());

            phase = match phase {
                Phase::Idle => {
                    if listener.is_fired() {
                        Phase::Terminated(Termination::Shutdown)
                    } else {
                        Phase::Binding
                    }
                }
                Phase::Binding => self.bind(&listener).await,
                Phase::Running { bound, spec } => self.launch(bound, spec, &mut listener).await,
                Phase::Stopping { bound, run } => self.stop(bound, run, &mut crash, &listener).await,
                Phase::Delaying(delay) => Self::delay(delay, &mut listener).await,
                Phase::Terminated(termination) => {
                    self.finish(&termination);
                    return termination;
                }
            };
        }
    }

    fn publish(&self, state: SupervisorState) {
        debug!("Supervisor for '{}' -> {}", self.job, state);
        self.state_tx.send_replace(state);
        self.stats.write().state = state;
    }

    fn resolve_port(&self) -> PromexecResult<u16> {
        if self.port == 0 {
            (self.allocator)()
        } else {
            Ok(self.port)
        }
    }

    async fn bind(&mut self, listener: &ShutdownListener) -> Phase {
        if listener.is_fired() {
            return Phase::Terminated(Termination::Shutdown);
        }

        let port = match self.resolve_port() {
            Ok(port) => port,
            Err(e) => {
                error!("Port allocation for '{}' failed: {}", self.job, e);
                return Phase::Terminated(Termination::AllocationFailed(e.to_string()));
            }
        };

        let spec = self.spec.materialize(port);

        match self.binder.bind(port).await {
            Ok(bound) => {
                {
                    let mut stats = self.stats.write();
                    stats.binds += 1;
                    stats.current_port = Some(port);
                }

                // Shutdown may have landed while the receiver was starting.
                if listener.is_fired() {
                    Phase::Stopping { bound, run: None }
                } else {
                    Phase::Running { bound, spec }
                }
            }
            Err(e) => {
                error!("Scrape receiver for '{}' could not be bound: {}", self.job, e);
                Phase::Terminated(Termination::BindFailed(e.to_string()))
            }
        }
    }

    async fn launch(
        &mut self,
        bound: BoundTarget,
        spec: MaterializedSpec,
        listener: &mut ShutdownListener,
    ) -> Phase {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        self.stats.write().launches += 1;

        let mut task = {
            let runner = self.runner.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { runner.run(spec, cancel).await })
        };

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = listener.fired() => {
                info!("Shutdown requested, stopping subprocess for '{}'", self.job);
                cancel.cancel();
                task.await
            }
        };

        let run = joined.unwrap_or_else(|e| {
            RunResult::failed(
                started.elapsed(),
                SubprocessError::Wait(format!("run task failed: {}", e)),
            )
        });

        Phase::Stopping {
            bound,
            run: Some(run),
        }
    }

    async fn stop(
        &mut self,
        bound: BoundTarget,
        run: Option<RunResult>,
        crash: &mut CrashState,
        listener: &ShutdownListener,
    ) -> Phase {
        if let Err(e) = self.binder.unbind(bound).await {
            error!(
                "Could not stop scrape receiver for '{}', abandoning supervision: {}",
                self.job, e
            );
            return Phase::Terminated(Termination::UnbindFailed(e.to_string()));
        }

        {
            let mut stats = self.stats.write();
            stats.unbinds += 1;
            stats.current_port = None;
        }

        let Some(run) = run else {
            return Phase::Terminated(Termination::Shutdown);
        };

        if let Some(ref e) = run.error {
            info!("Subprocess for '{}' exited: {}", self.job, e);
        }

        {
            let mut stats = self.stats.write();
            stats.last_run_ms = Some(run.elapsed.as_millis() as u64);
            stats.last_error = run.error.as_ref().map(|e| e.to_string());
        }

        if listener.is_fired() {
            return Phase::Terminated(Termination::Shutdown);
        }

        crash.crash_count = self.policy.next_crash_count(run.elapsed, crash.crash_count);
        let delay = self.policy.delay(run.elapsed, crash.crash_count, &mut self.rng);

        {
            let mut stats = self.stats.write();
            stats.crash_count = crash.crash_count;
            stats.last_delay_ms = Some(delay.as_millis().min(u128::from(u64::MAX)) as u64);
        }

        info!(
            "Subprocess for '{}' ran for {:?}, restarting in {:?} (crash count {})",
            self.job, run.elapsed, delay, crash.crash_count
        );

        Phase::Delaying(delay)
    }

    async fn delay(delay: Duration, listener: &mut ShutdownListener) -> Phase {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Phase::Binding,
            _ = listener.fired() => Phase::Terminated(Termination::Shutdown),
        }
    }

    fn finish(&self, termination: &Termination) {
        self.stats.write().termination = Some(termination.clone());
        match termination {
            Termination::Shutdown => info!("Supervisor for '{}' shut down", self.job),
            other => warn!("Supervisor for '{}' terminated: {:?}", self.job, other),
        }
    }
}

pub struct SupervisorHandle {
    shutdown: ShutdownSignal,
    state: watch::Receiver<SupervisorState>,
    stats: Arc<RwLock<SupervisorStats>>,
    task: JoinHandle<Termination>,
}

impl SupervisorHandle {
    /// Fires the shutdown signal without waiting for the loop to unwind.
    pub fn shutdown(&self) -> PromexecResult<()> {
        self.shutdown.fire()
    }

    /// Fires the shutdown signal (if not already fired) and waits for the loop to finish.
    pub async fn stop(self) -> PromexecResult<Termination> {
        match self.shutdown.fire() {
            Ok(()) | Err(PromexecError::AlreadyShutdown) => {}
            Err(e) => return Err(e),
        }
        self.wait().await
    }

    pub async fn wait(self) -> PromexecResult<Termination> {
        self.task
            .await
            .map_err(|e| PromexecError::Internal(format!("Supervisor task failed: {}", e)))
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
