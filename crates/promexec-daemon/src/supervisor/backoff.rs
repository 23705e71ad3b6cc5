use rand::Rng;
use std::time::Duration;

use super::types::{
    DEFAULT_DELAY_MULTIPLIER, DEFAULT_HEALTHY_CRASH_COUNT, DEFAULT_HEALTHY_PROCESS_TIME,
    DEFAULT_INITIAL_DELAY,
};

/// Restart delay for a process that ran for `elapsed` and has crashed `crash_count` times.
///
/// Healthy runs and the first `healthy_crash_threshold` crashes restart after
/// `initial_delay`. Past that the delay grows as
/// `initial_delay * multiplier ^ (crash_count - threshold + jitter)`, where
/// `jitter` is a draw from `[0, 1)` supplied by the caller.
pub fn delay(
    initial_delay: Duration,
    multiplier: f64,
    elapsed: Duration,
    healthy_duration: Duration,
    crash_count: u32,
    healthy_crash_threshold: u32,
    jitter: f64,
) -> Duration {
    if elapsed > healthy_duration || crash_count <= healthy_crash_threshold {
        return initial_delay;
    }

    let exponent = f64::from(crash_count - healthy_crash_threshold) + jitter.clamp(0.0, 1.0);
    let secs = initial_delay.as_secs_f64() * multiplier.powf(exponent);

    if secs.is_finite() {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::MAX
    }
}

/// Crash count after a run of `elapsed`: resets to 1 once a run outlives the health threshold.
pub fn next_crash_count(elapsed: Duration, healthy_duration: Duration, previous: u32) -> u32 {
    if elapsed > healthy_duration {
        1
    } else {
        previous.saturating_add(1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
    healthy_process_time: Duration,
    healthy_crash_count: u32,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            multiplier,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    pub fn with_healthy_process_time(mut self, healthy: Duration) -> Self {
        self.healthy_process_time = healthy;
        self
    }

    pub fn with_healthy_crash_count(mut self, count: u32) -> Self {
        self.healthy_crash_count = count;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn healthy_process_time(&self) -> Duration {
        self.healthy_process_time
    }

    pub fn healthy_crash_count(&self) -> u32 {
        self.healthy_crash_count
    }

    pub fn next_crash_count(&self, elapsed: Duration, previous: u32) -> u32 {
        next_crash_count(elapsed, self.healthy_process_time, previous)
    }

    /// Delay with an explicit jitter draw.
    pub fn delay_with_jitter(&self, elapsed: Duration, crash_count: u32, jitter: f64) -> Duration {
        let delay = delay(
            self.initial_delay,
            self.multiplier,
            elapsed,
            self.healthy_process_time,
            crash_count,
            self.healthy_crash_count,
            jitter,
        );

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    pub fn delay<R: Rng + ?Sized>(&self, elapsed: Duration, crash_count: u32, rng: &mut R) -> Duration {
        let jitter: f64 = rng.gen_range(0.0..1.0);
        self.delay_with_jitter(elapsed, crash_count, jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_DELAY_MULTIPLIER,
            max_delay: None,
            healthy_process_time: DEFAULT_HEALTHY_PROCESS_TIME,
            healthy_crash_count: DEFAULT_HEALTHY_CRASH_COUNT,
        }
    }
}
