use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::*;
use crate::scrape::{DEFAULT_METRICS_PATH, DEFAULT_SCHEME};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub timeout_secs: u64,
    pub metrics_path: String,
    pub scheme: String,
    pub start_timeout_secs: u64,
    pub stop_timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SCRAPE_TIMEOUT_SECS,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            start_timeout_secs: DEFAULT_RECEIVER_START_TIMEOUT_SECS,
            stop_timeout_secs: DEFAULT_RECEIVER_STOP_TIMEOUT_SECS,
        }
    }
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
