//! Mock time source

use core::sync::atomic::{AtomicI64, Ordering};

use crate::drivers::capture::TimeSource;

/// Manually advanced microsecond clock
#[derive(Debug, Default)]
pub struct MockClock {
    now_us: AtomicI64,
}

impl MockClock {
    pub fn new(start_us: i64) -> Self {
        Self {
            now_us: AtomicI64::new(start_us),
        }
    }

    pub fn set(&self, now_us: i64) {
        self.now_us.store(now_us, Ordering::Release);
    }

    /// Moves the clock forward and returns the new time
    pub fn advance(&self, delta_us: i64) -> i64 {
        self.now_us.fetch_add(delta_us, Ordering::AcqRel) + delta_us
    }
}

impl TimeSource for MockClock {
    fn now_micros(&self) -> i64 {
        self.now_us.load(Ordering::Acquire)
    }
}
