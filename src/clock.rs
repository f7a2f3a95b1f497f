//! Clock sources for retention and tier-selection decisions
//!
//! Every append and fetch takes "now" from a [`Clock`] so tests can pin time.
//! The system clock keeps a high-water mark so a wall-clock step backward
//! (e.g. NTP adjustment) never makes retention arithmetic go backward.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current epoch time in seconds.
pub trait Clock: Send + Sync {
    fn now_epoch(&self) -> u32;
}

/// Wall clock that never goes backward.
#[derive(Debug, Default)]
pub struct SystemClock {
    /// The largest timestamp we've ever returned (seconds).
    high_water: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_epoch(&self) -> u32 {
        let wall = Utc::now().timestamp();
        loop {
            let prev = self.high_water.load(Ordering::Acquire);
            let ts = wall.max(prev);
            match self.high_water.compare_exchange_weak(
                prev,
                ts,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return ts.max(0) as u32,
                Err(_) => continue,
            }
        }
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: u32) -> Self {
        Self {
            now: AtomicI64::new(now as i64),
        }
    }

    pub fn set(&self, now: u32) {
        self.now.store(now as i64, Ordering::Release);
    }

    pub fn advance(&self, seconds: u32) {
        self.now.fetch_add(seconds as i64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_epoch(&self) -> u32 {
        self.now.load(Ordering::Acquire) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let mut prev = 0u32;
        for _ in 0..100 {
            let ts = clock.now_epoch();
            assert!(ts >= prev, "timestamps must not go backward");
            prev = ts;
        }
    }

    #[test]
    fn system_clock_returns_current_era() {
        let clock = SystemClock::new();
        // After 2020.
        assert!(clock.now_epoch() > 1_577_836_800);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now_epoch(), 1000);
        clock.advance(60);
        assert_eq!(clock.now_epoch(), 1060);
        clock.set(10);
        assert_eq!(clock.now_epoch(), 10);
    }
}
