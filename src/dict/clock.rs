use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of the coarse ticks entry expiry is measured in.
pub trait Clock: Send + Sync {
    /// Seconds on a monotonic scale. Never 0, which marks entries that do
    /// not expire.
    fn now_ticks(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ticks(&self) -> u64 {
        self.origin.elapsed().as_secs() + 1
    }
}

/// Clock moved by hand, for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(1),
        }
    }

    pub fn advance(&self, seconds: u64) {
        self.ticks.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, tick: u64) {
        self.ticks.store(tick.max(1), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ticks(&self) -> u64 {
        (**self).now_ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ticks(), 1);
        clock.advance(4);
        assert_eq!(clock.now_ticks(), 5);
        clock.set(0);
        assert_eq!(clock.now_ticks(), 1);
    }

    #[rstest::rstest]
    fn test_system_clock_starts_at_one() {
        assert!(SystemClock::default().now_ticks() >= 1);
    }
}
