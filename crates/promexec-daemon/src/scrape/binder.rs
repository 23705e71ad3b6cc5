use promexec_types::{PromexecError, PromexecResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::config::ScrapeTargetConfig;
use super::receiver::{MetricsSink, ScrapeReceiver, ScrapeReceiverFactory};

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// A started sub-receiver bound to one port. Consumed by [`ScrapeTargetBinder::unbind`].
pub struct BoundTarget {
    port: u16,
    receiver: Box<dyn ScrapeReceiver>,
}

impl BoundTarget {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Debug for BoundTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTarget").field("port", &self.port).finish()
    }
}

pub struct ScrapeTargetBinder {
    factory: Arc<dyn ScrapeReceiverFactory>,
    sink: Arc<dyn MetricsSink>,
    config: ScrapeTargetConfig,
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl ScrapeTargetBinder {
    pub fn new(
        factory: Arc<dyn ScrapeReceiverFactory>,
        sink: Arc<dyn MetricsSink>,
        config: ScrapeTargetConfig,
    ) -> Self {
        Self {
            factory,
            sink,
            config,
            start_timeout: DEFAULT_START_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, start: Duration, stop: Duration) -> Self {
        self.start_timeout = start;
        self.stop_timeout = stop;
        self
    }

    pub fn config(&self) -> &ScrapeTargetConfig {
        &self.config
    }

    pub async fn bind(&mut self, port: u16) -> PromexecResult<BoundTarget> {
        self.config.retarget(port);

        let mut receiver = self
            .factory
            .create(self.config.clone(), self.sink.clone())
            .map_err(|e| {
                PromexecError::Bind(format!("Unable to create scrape receiver for port {}: {}", port, e))
            })?;

        match tokio::time::timeout(self.start_timeout, receiver.start()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PromexecError::Bind(format!(
                    "Could not start scrape receiver for port {}: {}",
                    port, e
                )));
            }
            Err(_) => {
                return Err(PromexecError::Bind(format!(
                    "Scrape receiver for port {} did not start within {:?}",
                    port, self.start_timeout
                )));
            }
        }

        info!("Scrape receiver bound to {}", self.config.target());
        Ok(BoundTarget { port, receiver })
    }

    pub async fn unbind(&self, bound: BoundTarget) -> PromexecResult<()> {
        let BoundTarget { port, mut receiver } = bound;

        match tokio::time::timeout(self.stop_timeout, receiver.shutdown()).await {
            Ok(Ok(())) => {
                debug!("Scrape receiver for port {} stopped", port);
                Ok(())
            }
            Ok(Err(e)) => Err(PromexecError::Unbind(format!(
                "Could not stop scrape receiver for port {}: {}",
                port, e
            ))),
            Err(_) => Err(PromexecError::Unbind(format!(
                "Scrape receiver for port {} did not stop within {:?}",
                port, self.stop_timeout
            ))),
        }
    }
}
