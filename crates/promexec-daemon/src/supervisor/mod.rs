mod backoff;
mod cancellation;
mod core;
mod stats;
mod types;

pub use self::core::{PortAllocator, ProcessSupervisor, SupervisorHandle};
pub use backoff::{delay, next_crash_count, BackoffPolicy};
pub use cancellation::{ShutdownListener, ShutdownSignal};
pub use stats::SupervisorStats;
pub use types::*;

#[cfg(test)]
mod tests;
