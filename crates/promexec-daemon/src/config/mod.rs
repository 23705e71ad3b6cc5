mod constants;
mod logging;
mod receiver;
mod restart;
mod scrape;
mod types;

pub use constants::*;
pub use logging::LoggingConfig;
pub use receiver::{ConfigSource, ReceiverConfig, RedactedConfig};
pub use restart::RestartConfig;
pub use scrape::ScrapeConfig;
pub use types::*;
