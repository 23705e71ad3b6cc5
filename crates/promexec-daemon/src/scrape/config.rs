use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
pub const TARGET_HOST: &str = "localhost";

/// Configuration handed to the scrape sub-receiver. Always exactly one static target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScrapeTargetConfig {
    pub job_name: String,
    pub scrape_interval: Duration,
    pub scrape_timeout: Duration,
    pub metrics_path: String,
    pub scheme: String,
    pub honor_labels: bool,
    pub honor_timestamps: bool,
    targets: Vec<String>,
}

impl ScrapeTargetConfig {
    pub fn new(job_name: impl Into<String>, scrape_interval: Duration, port: u16) -> Self {
        Self {
            job_name: job_name.into(),
            scrape_interval,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT.min(scrape_interval),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            honor_labels: false,
            honor_timestamps: true,
            targets: vec![target_address(port)],
        }
    }

    /// Scrape timeout, clamped so it never exceeds the interval.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.scrape_timeout = timeout.min(self.scrape_interval);
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn retarget(&mut self, port: u16) {
        self.targets = vec![target_address(port)];
    }

    pub fn target(&self) -> &str {
        &self.targets[0]
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn scrape_url(&self) -> String {
        let path = if self.metrics_path.starts_with('/') {
            self.metrics_path.clone()
        } else {
            format!("/{}", self.metrics_path)
        };
        format!("{}://{}{}", self.scheme, self.target(), path)
    }
}

fn target_address(port: u16) -> String {
    format!("{}:{}", TARGET_HOST, port)
}
