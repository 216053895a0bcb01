use std::sync::Arc;

use embassy_time::Instant;

use crate::error::CaptureError;
use crate::protocols::pwm::Edge;
use crate::shared::{RcCounters, RcShared};

/// Monotonic microsecond clock.
pub trait TimeSource: Send + Sync {
    fn now_micros(&self) -> i64;
}

/// Microseconds since the clock was created, read from the embassy time driver.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_micros(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

/// GPIO edge interrupt source for the RC input pin.
///
/// After `attach` the implementation calls [`EdgeSink::on_edge`] (or
/// [`EdgeSink::on_level_change`] if it has no timestamp of its own) for every
/// transition, from whatever context its interrupts run in.
pub trait PulseCapture: Send {
    fn attach(&mut self, sink: EdgeSink) -> Result<(), CaptureError>;
    fn detach(&mut self);
}

/// Producer end of the edge queue handed to a [`PulseCapture`].
///
/// Never blocks and never allocates: a full queue drops the edge and counts it.
#[derive(Clone)]
pub struct EdgeSink {
    shared: Arc<RcShared>,
    clock: Arc<dyn TimeSource>,
}

impl EdgeSink {
    pub(crate) fn new(shared: Arc<RcShared>, clock: Arc<dyn TimeSource>) -> Self {
        Self { shared, clock }
    }

    pub fn on_edge(&self, timestamp_us: i64, rising: bool) {
        RcCounters::bump(&self.shared.counters.edges_received);

        if self
            .shared
            .edges
            .try_send(Edge::new(timestamp_us, rising))
            .is_err()
        {
            RcCounters::bump(&self.shared.counters.edges_dropped);
        }
    }

    /// Timestamps the edge with the pipeline clock, then queues it.
    pub fn on_level_change(&self, rising: bool) {
        let now = self.clock.now_micros();
        self.on_edge(now, rising);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    impl TimeSource for FixedClock {
        fn now_micros(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn edges_are_queued_in_order() {
        let shared = Arc::new(RcShared::new(8));
        let sink = EdgeSink::new(shared.clone(), Arc::new(FixedClock(77)));

        sink.on_edge(10, false);
        sink.on_level_change(true);

        assert_eq!(shared.edges.try_receive().ok(), Some(Edge::new(10, false)));
        assert_eq!(shared.edges.try_receive().ok(), Some(Edge::new(77, true)));
        assert_eq!(shared.counters.snapshot().edges_received, 2);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let shared = Arc::new(RcShared::new(8));
        let sink = EdgeSink::new(shared.clone(), Arc::new(MonotonicClock::new()));

        let depth = crate::consts::EDGE_QUEUE_DEPTH as i64;
        for t in 0..depth + 5 {
            sink.on_edge(t + 1, t % 2 == 0);
        }

        let stats = shared.counters.snapshot();
        assert_eq!(stats.edges_received as i64, depth + 5);
        assert_eq!(stats.edges_dropped, 5);
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = clock.now_micros();
        assert!(first >= 0);
        assert!(second >= first + 1_000, "{} then {}", first, second);
    }
}
