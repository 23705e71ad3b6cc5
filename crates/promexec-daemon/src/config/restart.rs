use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::*;
use crate::supervisor::BackoffPolicy;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: Option<u64>,
    pub healthy_process_secs: u64,
    pub healthy_crash_count: u32,
    pub termination_grace_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            multiplier: DEFAULT_DELAY_MULTIPLIER,
            max_delay_ms: None,
            healthy_process_secs: DEFAULT_HEALTHY_PROCESS_SECS,
            healthy_crash_count: DEFAULT_HEALTHY_CRASH_COUNT,
            termination_grace_ms: DEFAULT_TERMINATION_GRACE_MS,
        }
    }
}

impl RestartConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let policy = BackoffPolicy::new(Duration::from_millis(self.initial_delay_ms), self.multiplier)
            .with_healthy_process_time(Duration::from_secs(self.healthy_process_secs))
            .with_healthy_crash_count(self.healthy_crash_count);

        match self.max_delay_ms {
            Some(max) => policy.with_max_delay(Duration::from_millis(max)),
            None => policy,
        }
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}
