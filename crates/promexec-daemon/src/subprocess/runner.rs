use async_trait::async_trait;
use promexec_types::SubprocessError;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::spec::MaterializedSpec;
use crate::supervisor::{RunResult, DEFAULT_TERMINATION_GRACE};

/// Runs one materialized spec to completion or cancellation.
///
/// The outcome is always data: launch failures and non-zero exits are
/// reported through [`RunResult::error`], never as an `Err`.
#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    async fn run(&self, spec: MaterializedSpec, cancel: CancellationToken) -> RunResult;
}

pub struct CommandRunner {
    job: String,
    grace: Duration,
}

impl CommandRunner {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            grace: DEFAULT_TERMINATION_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn build_command(&self, spec: &MaterializedSpec) -> Command {
        let mut command = shell_command(&spec.command);
        command
            .envs(spec.env.iter().map(|var| (var.name.as_str(), var.value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so termination reaches anything the shell forks.
        #[cfg(unix)]
        command.process_group(0);

        command
    }

    async fn terminate(&self, child: &mut Child, pid: Option<u32>) -> std::io::Result<ExitStatus> {
        #[cfg(unix)]
        if let Some(pid) = pid {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(group, Signal::SIGTERM) {
                debug!("SIGTERM to process group {} failed: {}", pid, e);
            }

            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(status) => {
                    let _ = killpg(group, Signal::SIGKILL);
                    return status;
                }
                Err(_) => {
                    warn!(
                        "Process {} for '{}' ignored SIGTERM for {:?}, killing",
                        pid, self.job, self.grace
                    );
                    let _ = killpg(group, Signal::SIGKILL);
                }
            }
        }

        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = child.start_kill() {
            debug!("Kill of '{}' failed: {}", self.job, e);
        }
        child.wait().await
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, spec: MaterializedSpec, cancel: CancellationToken) -> RunResult {
        let started = Instant::now();

        let mut child = match self.build_command(&spec).spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunResult::failed(started.elapsed(), SubprocessError::Launch(e.to_string()));
            }
        };

        let pid = child.id();
        info!("Started subprocess for '{}' (pid {:?}): {}", self.job, pid, spec.command);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, self.job.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, self.job.clone(), "stderr"));
        }

        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                debug!("Cancelling subprocess for '{}' (pid {:?})", self.job, pid);
                self.terminate(&mut child, pid).await
            }
        };

        let elapsed = started.elapsed();
        match status {
            Ok(status) => match exit_error(status) {
                None => RunResult::success(elapsed),
                Some(error) => RunResult::failed(elapsed, error),
            },
            Err(e) => RunResult::failed(elapsed, SubprocessError::Wait(e.to_string())),
        }
    }
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(not(unix))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

fn exit_error(status: ExitStatus) -> Option<SubprocessError> {
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(SubprocessError::ExitCode(code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(SubprocessError::Signaled(signal));
        }
    }

    Some(SubprocessError::Wait(format!("unrecognized exit status: {}", status)))
}

async fn forward_lines<R>(reader: R, job: String, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(job = %job, stream, "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading {} of '{}': {}", stream, job, e);
                break;
            }
        }
    }
}
