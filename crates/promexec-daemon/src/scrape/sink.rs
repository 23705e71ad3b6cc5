use async_trait::async_trait;
use promexec_types::{PromexecError, PromexecResult};
use tokio::sync::mpsc;
use tracing::debug;

use super::receiver::{MetricsSink, ScrapedBatch};

/// Logs each batch and drops it.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    async fn consume(&self, batch: ScrapedBatch) -> PromexecResult<()> {
        let samples = batch
            .body
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .count();
        debug!(
            "Scraped {} ({}): {} bytes, {} sample lines",
            batch.target,
            batch.job_name,
            batch.body.len(),
            samples
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<ScrapedBatch>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScrapedBatch>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MetricsSink for ChannelSink {
    async fn consume(&self, batch: ScrapedBatch) -> PromexecResult<()> {
        self.sender
            .send(batch)
            .await
            .map_err(|_| PromexecError::Internal("Metrics channel closed".into()))
    }
}
