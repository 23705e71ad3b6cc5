pub const DEFAULT_RECEIVER_NAME: &str = "prometheus_exec";
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_DELAY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_HEALTHY_PROCESS_SECS: u64 = 30 * 60;
pub const DEFAULT_HEALTHY_CRASH_COUNT: u32 = 3;
pub const DEFAULT_TERMINATION_GRACE_MS: u64 = 5_000;
pub const DEFAULT_RECEIVER_START_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RECEIVER_STOP_TIMEOUT_SECS: u64 = 30;
