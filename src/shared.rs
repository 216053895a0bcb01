use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    channel::Channel,
    pubsub::PubSubChannel,
    signal::Signal,
};
use navio_interface::{ChannelSnapshot, Channels, Frame, RcStats, MAX_CHANNELS};

use crate::consts::{
    EDGE_QUEUE_DEPTH, FRAME_QUEUE_DEPTH, FRAME_SUBSCRIBER_DEPTH, MAX_FRAME_SUBSCRIBERS,
};
use crate::protocols::pwm::Edge;

pub type EdgeQueue = Channel<CriticalSectionRawMutex, Edge, EDGE_QUEUE_DEPTH>;
pub type FrameQueue = Channel<CriticalSectionRawMutex, Frame, FRAME_QUEUE_DEPTH>;
pub type FrameUpdates =
    PubSubChannel<CriticalSectionRawMutex, Frame, FRAME_SUBSCRIBER_DEPTH, MAX_FRAME_SUBSCRIBERS, 1>;

/// Everything the edge producer and the two workers share for one RC input.
pub struct RcShared {
    // producer -> decoder
    pub edges: EdgeQueue,
    // decoder -> dispatcher
    pub frames: FrameQueue,
    // dispatcher -> subscribers
    pub frame_updates: FrameUpdates,
    pub store: ChannelStore,
    pub counters: RcCounters,
    pub decoder_stop: Signal<CriticalSectionRawMutex, ()>,
    pub dispatcher_stop: Signal<CriticalSectionRawMutex, ()>,
    stopping: AtomicBool,
}

impl RcShared {
    pub fn new(store_channels: usize) -> Self {
        Self {
            edges: Channel::new(),
            frames: Channel::new(),
            frame_updates: PubSubChannel::new(),
            store: ChannelStore::new(store_channels),
            counters: RcCounters::default(),
            decoder_stop: Signal::new(),
            dispatcher_stop: Signal::new(),
            stopping: AtomicBool::new(false),
        }
    }

    /// Raises the stop flag and wakes both workers. Returns false if already stopping.
    pub fn request_stop(&self) -> bool {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.decoder_stop.signal(());
        self.dispatcher_stop.signal(());
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

/// Latest published channel values.
///
/// The whole snapshot is replaced under one lock, so readers see either the
/// previous frame or the new one and never a mix of both.
pub struct ChannelStore {
    capacity: usize,
    latest: Mutex<CriticalSectionRawMutex, RefCell<ChannelSnapshot>>,
}

impl ChannelStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CHANNELS);

        Self {
            capacity,
            latest: Mutex::new(RefCell::new(ChannelSnapshot {
                sequence: 0,
                timestamp_us: 0,
                channels: zeroed(capacity),
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publishes a frame and returns its sequence number, or `None` (store
    /// untouched) when the frame carries more channels than the store holds.
    pub fn publish(&self, frame: &Frame) -> Option<u32> {
        if frame.channel_count() > self.capacity {
            return None;
        }

        let mut channels = zeroed(self.capacity);
        channels[..frame.channel_count()].copy_from_slice(&frame.channels);

        Some(self.latest.lock(|latest| {
            let sequence = latest.borrow().sequence.wrapping_add(1);
            latest.replace(ChannelSnapshot {
                sequence,
                timestamp_us: frame.timestamp_us,
                channels,
            });
            sequence
        }))
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.latest.lock(|latest| latest.borrow().clone())
    }

    pub fn channels(&self) -> Channels {
        self.latest.lock(|latest| latest.borrow().channels.clone())
    }
}

fn zeroed(count: usize) -> Channels {
    let mut channels = Channels::new();
    channels.resize_default(count).ok();
    channels
}

#[derive(Default)]
pub struct RcCounters {
    pub edges_received: AtomicU32,
    pub edges_dropped: AtomicU32,
    pub cycles_rejected: AtomicU32,
    pub sync_count: AtomicU32,
    pub frames_decoded: AtomicU32,
    pub frames_dropped: AtomicU32,
    pub frames_published: AtomicU32,
    pub frame_interval_us: AtomicI64,
}

impl RcCounters {
    pub fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RcStats {
        RcStats {
            edges_received: self.edges_received.load(Ordering::Relaxed),
            edges_dropped: self.edges_dropped.load(Ordering::Relaxed),
            cycles_rejected: self.cycles_rejected.load(Ordering::Relaxed),
            sync_count: self.sync_count.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frame_interval_us: self.frame_interval_us.load(Ordering::Relaxed),
        }
    }
}
