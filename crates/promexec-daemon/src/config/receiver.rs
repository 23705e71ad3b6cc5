use promexec_types::{EnvVar, PromexecError, PromexecResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::constants::{DEFAULT_RECEIVER_NAME, DEFAULT_SCRAPE_INTERVAL_SECS};
use super::logging::LoggingConfig;
use super::restart::RestartConfig;
use super::scrape::ScrapeConfig;
use super::types::LogLevel;
use crate::scrape::ScrapeTargetConfig;
use crate::subprocess::SubprocessSpec;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// `prometheus_exec` or `prometheus_exec/<job>`.
    pub name: String,
    pub exec: String,
    pub env: Vec<EnvVar>,
    /// 0 allocates a fresh port for every launch.
    pub port: u16,
    pub scrape_interval_secs: u64,
    pub restart: RestartConfig,
    pub scrape: ScrapeConfig,
    pub logging: LoggingConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_RECEIVER_NAME.to_string(),
            exec: String::new(),
            env: Vec::new(),
            port: 0,
            scrape_interval_secs: DEFAULT_SCRAPE_INTERVAL_SECS,
            restart: RestartConfig::default(),
            scrape: ScrapeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReceiverConfig {
    pub fn load(path: impl AsRef<Path>) -> PromexecResult<Self> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like [`ReceiverConfig::load`], also reporting whether the file existed.
    /// Runs before logging is set up, so it logs nothing itself.
    pub fn load_with_source(path: impl AsRef<Path>) -> PromexecResult<(Self, ConfigSource)> {
        let path = path.as_ref();

        let (mut config, source) = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| PromexecError::Config(format!("Failed to read config: {}", e)))?;

            (Self::from_toml(&contents)?, ConfigSource::File(path.to_path_buf()))
        } else {
            (Self::default(), ConfigSource::Defaults)
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok((config, source))
    }

    pub fn from_toml(contents: &str) -> PromexecResult<Self> {
        toml::from_str(contents)
            .map_err(|e| PromexecError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(exec) = std::env::var("PROMEXEC_EXEC") {
            self.exec = exec;
        }

        if let Ok(port) = std::env::var("PROMEXEC_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(interval) = std::env::var("PROMEXEC_SCRAPE_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                self.scrape_interval_secs = secs;
            }
        }

        if let Ok(level) = std::env::var("PROMEXEC_LOG_LEVEL") {
            self.logging.level = LogLevel::parse(&level).unwrap_or_default();
        }

        if std::env::var("PROMEXEC_LOG_JSON").is_ok() {
            self.logging.json = true;
        }
    }

    pub fn validate(&self) -> PromexecResult<()> {
        if self.exec.trim().is_empty() {
            return Err(PromexecError::Config(format!(
                "No command to execute entered in config file for {}",
                self.name
            )));
        }

        if self.name.split('/').next().unwrap_or_default().is_empty() {
            return Err(PromexecError::Config(format!(
                "Invalid receiver name '{}'",
                self.name
            )));
        }

        if self.scrape_interval_secs == 0 {
            return Err(PromexecError::Config(
                "Scrape interval must be at least 1 second".into(),
            ));
        }

        for var in &self.env {
            if var.name.is_empty() || var.name.contains('=') {
                return Err(PromexecError::Config(format!(
                    "Invalid environment variable name '{}'",
                    var.name
                )));
            }
        }

        if self.restart.initial_delay_ms == 0 {
            return Err(PromexecError::Config(
                "Restart initial delay must be positive".into(),
            ));
        }

        if !self.restart.multiplier.is_finite() || self.restart.multiplier < 1.0 {
            return Err(PromexecError::Config(format!(
                "Restart multiplier must be at least 1.0, got {}",
                self.restart.multiplier
            )));
        }

        if let Some(max) = self.restart.max_delay_ms {
            if max < self.restart.initial_delay_ms {
                return Err(PromexecError::Config(
                    "Restart max delay cannot be below the initial delay".into(),
                ));
            }
        }

        if !matches!(self.scrape.scheme.as_str(), "http" | "https") {
            return Err(PromexecError::Config(format!(
                "Unsupported scrape scheme '{}'",
                self.scrape.scheme
            )));
        }

        if self.scrape.timeout_secs == 0 {
            return Err(PromexecError::Config(
                "Scrape timeout must be at least 1 second".into(),
            ));
        }

        if self.scrape.metrics_path.is_empty() {
            return Err(PromexecError::Config("Metrics path cannot be empty".into()));
        }

        if self.port == 0 && !self.subprocess_uses_port() {
            warn!(
                "Port is allocated dynamically but '{}' never references {{{{port}}}}; the exporter cannot know where to listen",
                self.name
            );
        }

        Ok(())
    }

    fn subprocess_uses_port(&self) -> bool {
        SubprocessSpec::new(self.exec.clone(), self.env.clone())
            .map(|spec| spec.uses_port())
            .unwrap_or(false)
    }

    /// Custom suffix of the receiver name, falling back to the prefix.
    pub fn job_name(&self) -> &str {
        let mut parts = self.name.splitn(2, '/');
        let prefix = parts.next().unwrap_or_default();
        match parts.next() {
            Some(suffix) if !suffix.is_empty() => suffix,
            _ => prefix,
        }
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn subprocess_spec(&self) -> PromexecResult<SubprocessSpec> {
        SubprocessSpec::new(self.exec.clone(), self.env.clone()).map_err(|_| {
            PromexecError::Config(format!(
                "No command to execute entered in config file for {}",
                self.name
            ))
        })
    }

    pub fn scrape_target_config(&self) -> ScrapeTargetConfig {
        ScrapeTargetConfig::new(self.job_name(), self.scrape_interval(), self.port)
            .with_timeout(self.scrape.timeout())
            .with_metrics_path(self.scrape.metrics_path.clone())
            .with_scheme(self.scrape.scheme.clone())
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            name: self.name.clone(),
            job_name: self.job_name().to_string(),
            exec: self.exec.clone(),
            env_names: self.env.iter().map(|var| var.name.clone()).collect(),
            port: self.port,
            scrape_interval_secs: self.scrape_interval_secs,
            scrape_url: self.scrape_target_config().scrape_url(),
            initial_delay_ms: self.restart.initial_delay_ms,
            healthy_process_secs: self.restart.healthy_process_secs,
            healthy_crash_count: self.restart.healthy_crash_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Printable view of the config. Environment values are withheld since they often carry credentials.
#[derive(Debug, Serialize)]
pub struct RedactedConfig {
    pub name: String,
    pub job_name: String,
    pub exec: String,
    pub env_names: Vec<String>,
    pub port: u16,
    pub scrape_interval_secs: u64,
    pub scrape_url: String,
    pub initial_delay_ms: u64,
    pub healthy_process_secs: u64,
    pub healthy_crash_count: u32,
}

impl std::fmt::Display for RedactedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "promexec receiver configuration")?;
        writeln!(f, "===============================")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Job: {}", self.job_name)?;
        writeln!(f, "Exec: {}", self.exec)?;
        if self.env_names.is_empty() {
            writeln!(f, "Env: (none)")?;
        } else {
            writeln!(f, "Env: {}", self.env_names.join(", "))?;
        }
        if self.port == 0 {
            writeln!(f, "Port: dynamic")?;
        } else {
            writeln!(f, "Port: {}", self.port)?;
        }
        writeln!(f, "Scrape: {} every {}s", self.scrape_url, self.scrape_interval_secs)?;
        write!(
            f,
            "Restart: initial delay {}ms, healthy after {}s, {} crashes allowed",
            self.initial_delay_ms, self.healthy_process_secs, self.healthy_crash_count
        )
    }
}
