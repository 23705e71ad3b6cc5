mod binder;
mod config;
mod http;
mod receiver;
mod sink;

pub use binder::{BoundTarget, ScrapeTargetBinder, DEFAULT_START_TIMEOUT, DEFAULT_STOP_TIMEOUT};
pub use config::{
    ScrapeTargetConfig, DEFAULT_METRICS_PATH, DEFAULT_SCHEME, DEFAULT_SCRAPE_TIMEOUT, TARGET_HOST,
};
pub use http::{HttpScrapeReceiver, HttpScrapeReceiverFactory};
pub use receiver::{MetricsSink, ScrapeReceiver, ScrapeReceiverFactory, ScrapedBatch};
pub use sink::{ChannelSink, LogSink};
