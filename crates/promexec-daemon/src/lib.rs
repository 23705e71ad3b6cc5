#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod port;
pub mod scrape;
pub mod subprocess;
pub mod supervisor;

pub use config::{ConfigSource, LogLevel, LoggingConfig, ReceiverConfig, RedactedConfig, RestartConfig, ScrapeConfig};
pub use scrape::{
    BoundTarget, ChannelSink, HttpScrapeReceiver, HttpScrapeReceiverFactory, LogSink, MetricsSink,
    ScrapeReceiver, ScrapeReceiverFactory, ScrapeTargetBinder, ScrapeTargetConfig, ScrapedBatch,
};
pub use subprocess::{CommandRunner, MaterializedSpec, ProcessRunner, SubprocessSpec};
pub use supervisor::{
    BackoffPolicy, ProcessSupervisor, RunResult, ShutdownSignal, SupervisorHandle, SupervisorState,
    SupervisorStats, Termination,
};
