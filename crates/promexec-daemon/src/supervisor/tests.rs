use super::*;
use crate::config::ReceiverConfig;
use crate::scrape::{LogSink, MetricsSink, ScrapeReceiver, ScrapeReceiverFactory, ScrapeTargetConfig};
use crate::subprocess::{MaterializedSpec, ProcessRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use promexec_types::{PromexecError, PromexecResult, SubprocessError};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Event {
    Bind(String),
    Unbind(String),
}

/// Crashes immediately for the first `crashes` launches, then runs until cancelled.
struct ScriptedRunner {
    crashes: usize,
    launched: Mutex<Vec<MaterializedSpec>>,
    blocking: Notify,
}

impl ScriptedRunner {
    fn new(crashes: usize) -> Arc<Self> {
        Arc::new(Self {
            crashes,
            launched: Mutex::new(Vec::new()),
            blocking: Notify::new(),
        })
    }

    fn launches(&self) -> usize {
        self.launched.lock().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: MaterializedSpec, cancel: CancellationToken) -> RunResult {
        let attempt = {
            let mut launched = self.launched.lock();
            launched.push(spec);
            launched.len()
        };

        if attempt <= self.crashes {
            return RunResult::failed(Duration::from_millis(1), SubprocessError::ExitCode(1));
        }

        self.blocking.notify_one();
        cancel.cancelled().await;
        RunResult::failed(Duration::from_millis(5), SubprocessError::Signaled(15))
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Ok,
    FailCreate,
    FailStop,
}

struct RecordingFactory {
    behavior: Behavior,
    events: Arc<Mutex<Vec<Event>>>,
    fire_on_start: Mutex<Option<ShutdownSignal>>,
}

impl RecordingFactory {
    fn new(behavior: Behavior) -> (Arc<Self>, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(Self {
            behavior,
            events: events.clone(),
            fire_on_start: Mutex::new(None),
        });
        (factory, events)
    }

    /// Receivers created from now on fire `signal` as soon as they start.
    fn fire_on_start(&self, signal: ShutdownSignal) {
        *self.fire_on_start.lock() = Some(signal);
    }
}

struct RecordingReceiver {
    target: String,
    fail_stop: bool,
    fire_on_start: Option<ShutdownSignal>,
    events: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl ScrapeReceiver for RecordingReceiver {
    async fn start(&mut self) -> PromexecResult<()> {
        self.events.lock().push(Event::Bind(self.target.clone()));
        if let Some(ref signal) = self.fire_on_start {
            signal.fire()?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> PromexecResult<()> {
        if self.fail_stop {
            return Err(PromexecError::Internal("receiver wedged".into()));
        }
        self.events.lock().push(Event::Unbind(self.target.clone()));
        Ok(())
    }
}

impl ScrapeReceiverFactory for RecordingFactory {
    fn create(
        &self,
        config: ScrapeTargetConfig,
        _sink: Arc<dyn MetricsSink>,
    ) -> PromexecResult<Box<dyn ScrapeReceiver>> {
        if matches!(self.behavior, Behavior::FailCreate) {
            return Err(PromexecError::Internal("no receiver for you".into()));
        }
        Ok(Box::new(RecordingReceiver {
            target: config.target().to_string(),
            fail_stop: matches!(self.behavior, Behavior::FailStop),
            fire_on_start: self.fire_on_start.lock().clone(),
            events: self.events.clone(),
        }))
    }
}

fn test_config(exec: &str, port: u16) -> ReceiverConfig {
    let mut config = ReceiverConfig {
        name: "prometheus_exec/test".into(),
        exec: exec.into(),
        port,
        ..Default::default()
    };
    config.restart.initial_delay_ms = 1;
    config.restart.healthy_crash_count = 100;
    config.scrape.start_timeout_secs = 1;
    config.scrape.stop_timeout_secs = 1;
    config
}

fn supervisor(
    config: &ReceiverConfig,
    runner: Arc<ScriptedRunner>,
    factory: Arc<RecordingFactory>,
) -> ProcessSupervisor {
    ProcessSupervisor::new(config, runner, factory, Arc::new(LogSink))
        .unwrap()
        .with_rng_seed(7)
}

async fn wait_until_blocking(runner: &ScriptedRunner) {
    tokio::time::timeout(Duration::from_secs(5), runner.blocking.notified())
        .await
        .expect("runner never reached its blocking launch");
}

#[tokio::test]
async fn test_bind_and_unbind_alternate_across_restarts() {
    let runner = ScriptedRunner::new(3);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    wait_until_blocking(&runner).await;
    assert_eq!(handle.state(), SupervisorState::Running);

    let termination = handle.stop().await.unwrap();
    assert_eq!(termination, Termination::Shutdown);

    let target = "localhost:9100".to_string();
    let expected: Vec<Event> = (0..4)
        .flat_map(|_| [Event::Bind(target.clone()), Event::Unbind(target.clone())])
        .collect();
    assert_eq!(*events.lock(), expected);
    assert_eq!(runner.launches(), 4);
}

#[tokio::test]
async fn test_shutdown_during_run_does_not_rebind() {
    let runner = ScriptedRunner::new(0);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    wait_until_blocking(&runner).await;
    let mut state = handle.watch_state();
    handle.shutdown().unwrap();

    let stats_before = handle.stats();
    let termination = handle.wait().await.unwrap();
    assert_eq!(termination, Termination::Shutdown);
    assert_eq!(*state.borrow_and_update(), SupervisorState::Terminated);

    assert_eq!(runner.launches(), 1);
    assert_eq!(events.lock().len(), 2);
    assert_eq!(stats_before.binds, 1);
}

#[tokio::test]
async fn test_shutdown_interrupts_restart_delay() {
    let runner = ScriptedRunner::new(1);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let mut config = test_config("exporter", 9100);
    config.restart.initial_delay_ms = 60_000;
    let handle = supervisor(&config, runner.clone(), factory).start();

    let mut state = handle.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SupervisorState::Delaying),
    )
    .await
    .unwrap()
    .unwrap();

    let termination = tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("stop must not wait out the restart delay")
        .unwrap();
    assert_eq!(termination, Termination::Shutdown);

    assert_eq!(runner.launches(), 1);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Bind("localhost:9100".into()),
            Event::Unbind("localhost:9100".into()),
        ]
    );
}

#[tokio::test]
async fn test_shutdown_while_binding_unbinds_without_launch() {
    let runner = ScriptedRunner::new(0);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let supervisor = supervisor(&test_config("exporter", 9100), runner.clone(), factory.clone());
    factory.fire_on_start(supervisor.shutdown_signal());

    let handle = supervisor.start();
    let termination = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(termination, Termination::Shutdown);

    assert_eq!(runner.launches(), 0);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Bind("localhost:9100".into()),
            Event::Unbind("localhost:9100".into()),
        ]
    );
}

#[tokio::test]
async fn test_double_shutdown_rejected() {
    let runner = ScriptedRunner::new(0);
    let (factory, _) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    wait_until_blocking(&runner).await;
    assert!(handle.shutdown().is_ok());
    assert!(matches!(handle.shutdown(), Err(PromexecError::AlreadyShutdown)));

    // stop() tolerates a signal that already fired.
    assert_eq!(handle.stop().await.unwrap(), Termination::Shutdown);
}

#[tokio::test]
async fn test_shutdown_before_first_bind() {
    let runner = ScriptedRunner::new(0);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    handle.shutdown().unwrap();
    let stats = handle.stats();
    assert_eq!(handle.wait().await.unwrap(), Termination::Shutdown);

    assert_eq!(runner.launches(), 0);
    assert!(events.lock().is_empty());
    assert_eq!(stats.launches, 0);
}

#[tokio::test]
async fn test_empty_command_rejected_before_binding() {
    let runner = ScriptedRunner::new(0);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);

    let result = ProcessSupervisor::new(
        &test_config("   ", 9100),
        runner.clone(),
        factory,
        Arc::new(LogSink),
    );

    match result {
        Err(PromexecError::Config(msg)) => {
            assert!(msg.contains("No command to execute"), "unexpected message: {}", msg)
        }
        Err(other) => panic!("expected config error, got {}", other),
        Ok(_) => panic!("expected config error"),
    }
    assert!(events.lock().is_empty());
    assert_eq!(runner.launches(), 0);
}

#[tokio::test]
async fn test_allocation_failure_terminates() {
    let runner = ScriptedRunner::new(0);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter --port={{port}}", 0), runner.clone(), factory)
        .with_port_allocator(|| Err(PromexecError::Allocation("no free ports".into())))
        .start();

    let termination = handle.wait().await.unwrap();
    assert!(matches!(termination, Termination::AllocationFailed(ref msg) if msg.contains("no free ports")));
    assert!(termination.is_abnormal());
    assert!(events.lock().is_empty());
    assert_eq!(runner.launches(), 0);
}

#[tokio::test]
async fn test_bind_failure_terminates_without_launch() {
    let runner = ScriptedRunner::new(0);
    let (factory, _) = RecordingFactory::new(Behavior::FailCreate);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    let termination = handle.wait().await.unwrap();
    assert!(matches!(termination, Termination::BindFailed(_)));
    assert_eq!(runner.launches(), 0);
}

#[tokio::test]
async fn test_unbind_failure_terminates_after_run() {
    let runner = ScriptedRunner::new(1);
    let (factory, events) = RecordingFactory::new(Behavior::FailStop);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();
    let mut state = handle.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SupervisorState::Terminated),
    )
    .await
    .unwrap()
    .unwrap();
    let stats = handle.stats();

    let termination = handle.wait().await.unwrap();
    assert!(matches!(termination, Termination::UnbindFailed(_)));
    assert_eq!(runner.launches(), 1);
    assert_eq!(*events.lock(), vec![Event::Bind("localhost:9100".into())]);
    assert_eq!(stats.unbinds, 0);
}

static NEXT_PORT: AtomicU16 = AtomicU16::new(21000);

fn sequential_port() -> PromexecResult<u16> {
    Ok(NEXT_PORT.fetch_add(1, Ordering::SeqCst))
}

#[tokio::test]
async fn test_dynamic_port_resolved_per_launch() {
    let runner = ScriptedRunner::new(2);
    let (factory, events) = RecordingFactory::new(Behavior::Ok);
    let mut config = test_config("exporter --port={{port}}", 0);
    config.env = vec![promexec_types::EnvVar::new("LISTEN", ":{{port}}")];

    let handle = supervisor(&config, runner.clone(), factory)
        .with_port_allocator(sequential_port)
        .start();

    wait_until_blocking(&runner).await;
    handle.stop().await.unwrap();

    let launched = runner.launched.lock().clone();
    assert_eq!(launched.len(), 3);

    let binds: Vec<String> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            Event::Bind(target) => Some(target.clone()),
            Event::Unbind(_) => None,
        })
        .collect();

    for (spec, target) in launched.iter().zip(&binds) {
        let port = target.trim_start_matches("localhost:");
        assert_eq!(spec.command, format!("exporter --port={}", port));
        assert_eq!(spec.env[0].value, format!(":{}", port));
    }

    let mut unique = binds.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_crash_count_tracked_in_stats() {
    let runner = ScriptedRunner::new(3);
    let (factory, _) = RecordingFactory::new(Behavior::Ok);
    let handle = supervisor(&test_config("exporter", 9100), runner.clone(), factory).start();

    wait_until_blocking(&runner).await;
    let stats = handle.stats();
    assert_eq!(stats.crash_count, 3);
    assert_eq!(stats.launches, 4);
    assert_eq!(stats.binds, 4);
    assert_eq!(stats.unbinds, 3);
    assert_eq!(stats.current_port, Some(9100));
    assert_eq!(stats.last_error.as_deref(), Some("process exited with status 1"));
    assert_eq!(stats.last_delay_ms, Some(1));

    handle.stop().await.unwrap();
}

#[cfg(unix)]
mod process {
    use super::*;

    fn real_config(exec: &str) -> ReceiverConfig {
        let mut config = test_config(exec, 0);
        config.restart.termination_grace_ms = 500;
        config
    }

    #[tokio::test]
    async fn test_long_running_exporter_stops_on_shutdown() {
        let config = real_config("sleep 30 # {{port}}");
        let handle = ProcessSupervisor::from_config(&config, Arc::new(LogSink))
            .unwrap()
            .start();

        let mut state = handle.watch_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == SupervisorState::Running),
        )
        .await
        .unwrap()
        .unwrap();

        let termination = tokio::time::timeout(Duration::from_secs(10), handle.stop())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(termination, Termination::Shutdown);
    }

    #[tokio::test]
    async fn test_crashing_exporter_is_restarted() {
        let config = real_config("exit 1 # {{port}}");
        let handle = ProcessSupervisor::from_config(&config, Arc::new(LogSink))
            .unwrap()
            .with_rng_seed(1)
            .start();

        tokio::time::timeout(Duration::from_secs(10), async {
            while handle.stats().launches < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let stats = handle.stats();
        assert!(stats.crash_count >= 2);

        let termination = handle.stop().await.unwrap();
        assert_eq!(termination, Termination::Shutdown);
    }
}
