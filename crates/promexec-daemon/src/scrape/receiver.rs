use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promexec_types::PromexecResult;
use std::sync::Arc;

use super::config::ScrapeTargetConfig;

/// One scrape of the target, forwarded unparsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapedBatch {
    pub job_name: String,
    pub target: String,
    pub scraped_at: DateTime<Utc>,
    pub body: String,
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn consume(&self, batch: ScrapedBatch) -> PromexecResult<()>;
}

#[async_trait]
pub trait ScrapeReceiver: Send {
    async fn start(&mut self) -> PromexecResult<()>;
    async fn shutdown(&mut self) -> PromexecResult<()>;
}

pub trait ScrapeReceiverFactory: Send + Sync {
    fn create(
        &self,
        config: ScrapeTargetConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> PromexecResult<Box<dyn ScrapeReceiver>>;
}
