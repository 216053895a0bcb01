use core::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use embassy_futures::select::{select, Either};
use log::{debug, info, warn};
use navio_interface::Frame;

use crate::consts::FRAME_INTERVAL_SAMPLES;
use crate::shared::{RcCounters, RcShared};
use crate::tools::blocking::block_on_timeout;
use crate::tools::moving_average::MovingAverage;

/// Dispatch worker: publishes decoded frames into the channel store and out to
/// every frame subscriber, in decode order.
pub fn dispatcher_task(shared: Arc<RcShared>, wait: Duration) {
    let mut dispatcher = Dispatcher::new(&shared);
    info!("RC dispatcher started");

    while !shared.is_stopping() {
        match block_on_timeout(
            select(shared.frames.receive(), shared.dispatcher_stop.wait()),
            wait,
        ) {
            None => continue,
            Some(Either::Second(())) => break,
            Some(Either::First(frame)) => dispatcher.dispatch(frame),
        }
    }

    info!("RC dispatcher stopped");
}

struct Dispatcher<'a> {
    shared: &'a RcShared,
    interval: MovingAverage<FRAME_INTERVAL_SAMPLES>,
    last_timestamp: Option<i64>,
}

impl<'a> Dispatcher<'a> {
    fn new(shared: &'a RcShared) -> Self {
        Self {
            shared,
            interval: MovingAverage::new(),
            last_timestamp: None,
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        let counters = &self.shared.counters;

        let Some(sequence) = self.shared.store.publish(&frame) else {
            RcCounters::bump(&counters.frames_dropped);
            warn!(
                "RC frame with {} channels does not fit the {} channel store, dropped",
                frame.channel_count(),
                self.shared.store.capacity()
            );
            return;
        };
        RcCounters::bump(&counters.frames_published);

        let interval = self
            .last_timestamp
            .replace(frame.timestamp_us)
            .and_then(|previous| frame.timestamp_us.checked_sub(previous));
        if let Some(interval) = interval {
            self.interval.sample(interval);
            counters
                .frame_interval_us
                .store(self.interval.get_average(), Ordering::Relaxed);
        }

        debug!("RC frame {} published", sequence);
        // lagging subscribers lose their oldest frame, this never waits
        self.shared
            .frame_updates
            .immediate_publisher()
            .publish_immediate(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publishes_in_order_and_tracks_interval() {
        let shared = RcShared::new(8);
        let mut subscriber = shared.frame_updates.subscriber().unwrap();
        let mut dispatcher = Dispatcher::new(&shared);

        for (i, timestamp) in [1_000, 23_000, 45_000].into_iter().enumerate() {
            let frame = Frame::with_channels(timestamp, &[1000 + i as i32; 8]).unwrap();
            dispatcher.dispatch(frame);
        }

        let snapshot = shared.store.snapshot();
        assert_eq!(snapshot.sequence, 3);
        assert_eq!(snapshot.timestamp_us, 45_000);

        let received: Vec<i64> = (0..3)
            .filter_map(|_| subscriber.try_next_message_pure())
            .map(|frame| frame.timestamp_us)
            .collect();
        assert_eq!(received, vec![1_000, 23_000, 45_000]);

        let stats = shared.counters.snapshot();
        assert_eq!(stats.frames_published, 3);
        assert_eq!(stats.frame_interval_us, 22_000);
    }

    #[test]
    fn far_apart_timestamps_do_not_break_dispatch() {
        let shared = RcShared::new(8);
        let mut dispatcher = Dispatcher::new(&shared);

        for timestamp in [i64::MIN + 1, i64::MAX, i64::MAX - 1, i64::MAX] {
            dispatcher.dispatch(Frame::with_channels(timestamp, &[1500; 8]).unwrap());
        }

        let stats = shared.counters.snapshot();
        assert_eq!(stats.frames_published, 4);
        // only the two intervals that fit an i64 were sampled: -1 and 1
        assert_eq!(stats.frame_interval_us, 0);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let shared = RcShared::new(4);
        let mut dispatcher = Dispatcher::new(&shared);

        dispatcher.dispatch(Frame::with_channels(1_000, &[1500; 4]).unwrap());
        dispatcher.dispatch(Frame::with_channels(23_000, &[2000; 8]).unwrap());

        assert_eq!(shared.store.snapshot().sequence, 1);
        assert_eq!(shared.store.channels().as_slice(), &[1500; 4]);
        assert_eq!(shared.counters.snapshot().frames_dropped, 1);
    }

    #[test]
    fn stop_signal_ends_the_loop() {
        let shared = Arc::new(RcShared::new(8));
        let worker_shared = shared.clone();
        // a long wait proves the signal, not the timeout, ends the loop
        let worker = thread::spawn(move || dispatcher_task(worker_shared, Duration::from_secs(60)));

        shared.frames.try_send(Frame::with_channels(5, &[1234; 8]).unwrap()).unwrap();
        while shared.store.snapshot().sequence == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        shared.request_stop();
        worker.join().unwrap();
        assert_eq!(shared.store.channels().as_slice(), &[1234; 8]);
    }
}
