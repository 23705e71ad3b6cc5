use chrono::{DateTime, Utc};

use super::types::{SupervisorState, Termination};

#[derive(Clone, Debug, serde::Serialize)]
pub struct SupervisorStats {
    pub job_name: String,
    pub state: SupervisorState,
    pub started_at: DateTime<Utc>,
    pub launches: u64,
    pub binds: u64,
    pub unbinds: u64,
    pub crash_count: u32,
    pub current_port: Option<u16>,
    pub last_run_ms: Option<u64>,
    pub last_delay_ms: Option<u64>,
    pub last_error: Option<String>,
    pub termination: Option<Termination>,
}

impl SupervisorStats {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            state: SupervisorState::Idle,
            started_at: Utc::now(),
            launches: 0,
            binds: 0,
            unbinds: 0,
            crash_count: 0,
            current_port: None,
            last_run_ms: None,
            last_delay_ms: None,
            last_error: None,
            termination: None,
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
