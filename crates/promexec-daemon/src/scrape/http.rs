use async_trait::async_trait;
use chrono::Utc;
use promexec_types::{PromexecError, PromexecResult};
use reqwest::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ScrapeTargetConfig;
use super::receiver::{MetricsSink, ScrapeReceiver, ScrapeReceiverFactory, ScrapedBatch};

const ACCEPT_HEADER: &str = "text/plain;version=0.0.4;q=0.9,*/*;q=0.1";

/// Periodically fetches the exposition page of its target and hands the raw body to the sink.
pub struct HttpScrapeReceiver {
    config: ScrapeTargetConfig,
    client: Client,
    sink: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl HttpScrapeReceiver {
    pub fn new(config: ScrapeTargetConfig, sink: Arc<dyn MetricsSink>) -> PromexecResult<Self> {
        if config.scrape_interval.is_zero() {
            return Err(PromexecError::Bind("Scrape interval must be positive".into()));
        }

        let client = Client::builder()
            .timeout(config.scrape_timeout)
            .build()
            .map_err(|e| PromexecError::Bind(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            sink,
            cancel: CancellationToken::new(),
            handle: None,
        })
    }

    pub fn config(&self) -> &ScrapeTargetConfig {
        &self.config
    }
}

#[async_trait]
impl ScrapeReceiver for HttpScrapeReceiver {
    async fn start(&mut self) -> PromexecResult<()> {
        if self.handle.is_some() {
            return Err(PromexecError::Bind(format!(
                "Scrape receiver for {} already started",
                self.config.target()
            )));
        }

        let url = self.config.scrape_url();
        let job_name = self.config.job_name.clone();
        let target = self.config.target().to_string();
        let scrape_interval = self.config.scrape_interval;
        let client = self.client.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();

        info!("Scraping {} every {:?} as job '{}'", url, scrape_interval, job_name);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(scrape_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = scrape_and_forward(&client, &url, &job_name, &target, sink.as_ref()) => {}
                }
            }

            debug!("Scrape loop for {} stopped", target);
        }));

        Ok(())
    }

    async fn shutdown(&mut self) -> PromexecResult<()> {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            handle.await.map_err(|e| {
                PromexecError::Unbind(format!(
                    "Scrape loop for {} ended abnormally: {}",
                    self.config.target(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}

async fn scrape_and_forward(
    client: &Client,
    url: &str,
    job_name: &str,
    target: &str,
    sink: &dyn MetricsSink,
) {
    match scrape_once(client, url).await {
        Ok(body) => {
            let batch = ScrapedBatch {
                job_name: job_name.to_string(),
                target: target.to_string(),
                scraped_at: Utc::now(),
                body,
            };
            if let Err(e) = sink.consume(batch).await {
                warn!("Metrics sink rejected scrape of {}: {}", target, e);
            }
        }
        // Expected while the exporter is still starting up.
        Err(e) => debug!("Scrape of {} failed: {}", url, e),
    }
}

async fn scrape_once(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    client
        .get(url)
        .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

#[derive(Clone, Debug, Default)]
pub struct HttpScrapeReceiverFactory;

impl ScrapeReceiverFactory for HttpScrapeReceiverFactory {
    fn create(
        &self,
        config: ScrapeTargetConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> PromexecResult<Box<dyn ScrapeReceiver>> {
        Ok(Box::new(HttpScrapeReceiver::new(config, sink)?))
    }
}
