use promexec_types::{PromexecError, PromexecResult, SubprocessError};
use std::time::Duration;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_DELAY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_HEALTHY_PROCESS_TIME: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_HEALTHY_CRASH_COUNT: u32 = 3;
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    #[default]
    Idle,
    Binding,
    Running,
    Stopping,
    Delaying,
    Terminated,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Idle => write!(f, "idle"),
            SupervisorState::Binding => write!(f, "binding"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Stopping => write!(f, "stopping"),
            SupervisorState::Delaying => write!(f, "delaying"),
            SupervisorState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Why the control loop stopped.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Termination {
    Shutdown,
    AllocationFailed(String),
    BindFailed(String),
    UnbindFailed(String),
}

impl Termination {
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Termination::Shutdown)
    }

    pub fn into_result(self) -> PromexecResult<()> {
        match self {
            Termination::Shutdown => Ok(()),
            Termination::AllocationFailed(msg) => Err(PromexecError::Allocation(msg)),
            Termination::BindFailed(msg) => Err(PromexecError::Bind(msg)),
            Termination::UnbindFailed(msg) => Err(PromexecError::Unbind(msg)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunResult {
    pub elapsed: Duration,
    pub error: Option<SubprocessError>,
}

impl RunResult {
    pub fn success(elapsed: Duration) -> Self {
        Self { elapsed, error: None }
    }

    pub fn failed(elapsed: Duration, error: SubprocessError) -> Self {
        Self {
            elapsed,
            error: Some(error),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrashState {
    pub crash_count: u32,
}
