use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{Subscriber, WaitResult};
use log::{error, info, warn};
use navio_interface::{ChannelSnapshot, Channels, Frame, RcStats, MAX_CHANNELS};

use crate::consts::{
    CPPM_CHANNEL_COUNT, FRAME_SUBSCRIBER_DEPTH, MAX_FRAME_SUBSCRIBERS, WORKER_WAIT_TIMEOUT,
};
use crate::drivers::capture::{EdgeSink, PulseCapture, TimeSource};
use crate::error::RcInputError;
use crate::protocols::cppm::{CppmConfig, CppmDecoder, PulseDecoder};
use crate::shared::RcShared;
use crate::tasks::{decoder::decoder_task, dispatcher::dispatcher_task};
use crate::tools::blocking::block_on_timeout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcProtocol {
    Cppm,
    // the Navio+ can also be wired for SBUS, which is not decoded here
    Sbus,
}

#[derive(Clone, Copy, Debug)]
pub struct RcInputConfig {
    pub protocol: RcProtocol,
    pub cppm: CppmConfig,
    // size of the published channel array
    pub store_channels: usize,
    // longest a worker waits on an empty queue before rechecking for stop
    pub worker_wait: Duration,
}

impl Default for RcInputConfig {
    fn default() -> Self {
        Self {
            protocol: RcProtocol::Cppm,
            cppm: CppmConfig::default(),
            store_channels: CPPM_CHANNEL_COUNT,
            worker_wait: WORKER_WAIT_TIMEOUT,
        }
    }
}

/// RC receiver input.
///
/// Owns the pulse capture and two worker threads: `rc-decoder` turns queued
/// edges into frames and `rc-dispatcher` publishes them. The capture callback
/// only timestamps and queues edges. Stopping (explicitly or on drop) detaches
/// the capture and joins both workers.
pub struct RcInput<P: PulseCapture> {
    shared: Arc<RcShared>,
    capture: P,
    workers: heapless::Vec<JoinHandle<()>, 2>,
    stopped: bool,
}

impl<P: PulseCapture> RcInput<P> {
    pub fn new(
        config: RcInputConfig,
        capture: P,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RcInputError> {
        match config.protocol {
            RcProtocol::Cppm => {
                let decoder = CppmDecoder::new(config.cppm)?;
                Self::start_with_decoder(config, decoder, capture, clock)
            }
            RcProtocol::Sbus => Err(RcInputError::NotSupported(RcProtocol::Sbus)),
        }
    }

    /// Starts the pipeline with any decoder. `config.protocol` and
    /// `config.cppm` are not used.
    pub fn start_with_decoder<D: PulseDecoder + 'static>(
        config: RcInputConfig,
        decoder: D,
        capture: P,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RcInputError> {
        if config.store_channels == 0 || config.store_channels > MAX_CHANNELS {
            return Err(RcInputError::InvalidConfig(
                "store channels must be between 1 and 16",
            ));
        }
        if config.worker_wait.is_zero() {
            return Err(RcInputError::InvalidConfig("worker wait must not be zero"));
        }

        let mut input = Self {
            shared: Arc::new(RcShared::new(config.store_channels)),
            capture,
            workers: heapless::Vec::new(),
            stopped: false,
        };
        let wait = config.worker_wait;

        // on any error below, dropping `input` stops whatever already started
        let shared = input.shared.clone();
        input.spawn("rc-decoder", move || decoder_task(shared, decoder, wait))?;
        let shared = input.shared.clone();
        input.spawn("rc-dispatcher", move || dispatcher_task(shared, wait))?;

        let sink = EdgeSink::new(input.shared.clone(), clock);
        if let Err(e) = input.capture.attach(sink) {
            error!("Failed to attach RC pulse capture: {}", e);
            return Err(e.into());
        }

        info!(
            "RC input started ({} store channels, {:?} worker wait)",
            config.store_channels, wait
        );
        Ok(input)
    }

    fn spawn(
        &mut self,
        name: &str,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<(), RcInputError> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(task)
            .map_err(|e| {
                error!("Failed to spawn {}: {}", name, e);
                RcInputError::WorkerSpawn
            })?;
        self.workers
            .push(handle)
            .map_err(|_| RcInputError::WorkerSpawn)
    }

    /// Latest published channel values, zeros before the first frame.
    pub fn current_channels(&self) -> Channels {
        self.shared.store.channels()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.shared.store.snapshot()
    }

    /// Receives every frame published from now on.
    pub fn subscribe(&self) -> Result<FrameSubscriber<'_>, RcInputError> {
        let subscriber = self
            .shared
            .frame_updates
            .subscriber()
            .map_err(|_| RcInputError::SubscriberLimit)?;
        Ok(FrameSubscriber { subscriber })
    }

    pub fn stats(&self) -> RcStats {
        self.shared.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && self.workers.iter().all(|worker| !worker.is_finished())
    }

    /// Detaches the capture and stops both workers. Safe to call more than once.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.capture.detach();
        self.shared.request_stop();

        while let Some(worker) = self.workers.pop() {
            let name = worker.thread().name().unwrap_or("rc worker").to_owned();
            if worker.join().is_err() {
                error!("{} panicked", name);
            }
        }

        info!("RC input stopped");
    }
}

impl<P: PulseCapture> Drop for RcInput<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-consumer queue of published frames.
///
/// Bounded: a consumer that falls behind loses its oldest frames (logged) and
/// never holds up the pipeline.
pub struct FrameSubscriber<'a> {
    subscriber: Subscriber<
        'a,
        CriticalSectionRawMutex,
        Frame,
        FRAME_SUBSCRIBER_DEPTH,
        MAX_FRAME_SUBSCRIBERS,
        1,
    >,
}

impl FrameSubscriber<'_> {
    pub fn try_next(&mut self) -> Option<Frame> {
        loop {
            match self.subscriber.try_next_message()? {
                WaitResult::Message(frame) => return Some(frame),
                WaitResult::Lagged(missed) => {
                    warn!("RC frame subscriber lagged, {} frames skipped", missed)
                }
            }
        }
    }

    /// Waits up to `timeout` for the next frame.
    pub fn wait_next(&mut self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match block_on_timeout(self.subscriber.next_message(), remaining)? {
                WaitResult::Message(frame) => return Some(frame),
                WaitResult::Lagged(missed) => {
                    warn!("RC frame subscriber lagged, {} frames skipped", missed)
                }
            }
        }
    }
}
