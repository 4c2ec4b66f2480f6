use std::time::Duration;

/// Source of unconditional delays (settle holds, retry backoff).
///
/// Polled waits live in the driver; only fixed delays go through here.
pub trait Clock {
    fn pause(&self, duration: Duration, reason: &'static str);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn pause(&self, duration: Duration, reason: &'static str) {
        tracing::debug!(reason, millis = duration.as_millis() as u64, "pausing");
        std::thread::sleep(duration);
    }
}
