use std::time::Duration;

/// Linear reconnect backoff.
///
/// Every failed cycle adds one `increment`, up to `cap`. A successful open
/// resets the delay to zero.
#[derive(Debug, Clone)]
pub struct Backoff {
    increment: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(increment: Duration, cap: Duration) -> Self {
        Self {
            increment,
            cap,
            current: Duration::ZERO,
        }
    }

    /// Record a failed cycle and return the delay before the next attempt
    pub fn fail(&mut self) -> Duration {
        self.current = self.current.saturating_add(self.increment).min(self.cap);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}
