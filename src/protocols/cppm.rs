use core::mem;

use log::debug;
use navio_interface::{Frame, MAX_CHANNELS};

use crate::consts::{CPPM_CHANNEL_COUNT, CPPM_LOW_LIMIT_US, CPPM_SYNC_MIN_US};
use crate::error::RcInputError;
use crate::protocols::pwm::Cycle;

/// Outcome of feeding one cycle to a [`PulseDecoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeEvent {
    /// noise or a malformed cycle, any frame in progress was dropped
    Rejected,
    /// not decoding and not a sync gap
    Ignored,
    /// sync gap seen, `restarted` is set when it cut off a frame in progress
    Synced { restarted: bool },
    Captured { channel: usize },
    Completed(Frame),
    /// the frame has no slot for the next channel, dropped
    Overflow,
}

pub trait PulseDecoder: Send {
    fn max_channels(&self) -> usize;
    fn decode(&mut self, cycle: &Cycle) -> DecodeEvent;
    fn reset(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CppmConfig {
    pub channel_count: usize,
    pub sync_min_us: i64,
    pub low_limit_us: i64,
}

impl CppmConfig {
    pub fn validate(&self) -> Result<(), RcInputError> {
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(RcInputError::InvalidConfig(
                "channel count must be between 1 and 16",
            ));
        }
        if self.low_limit_us <= 0 || self.low_limit_us >= self.sync_min_us {
            return Err(RcInputError::InvalidConfig(
                "low limit must be positive and below the sync length",
            ));
        }
        Ok(())
    }
}

impl Default for CppmConfig {
    fn default() -> Self {
        Self {
            channel_count: CPPM_CHANNEL_COUNT,
            sync_min_us: CPPM_SYNC_MIN_US,
            low_limit_us: CPPM_LOW_LIMIT_US,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    /// no frame in progress, waiting for a sync gap
    Idle,
    /// sync gap seen, the next cycle is channel 0
    Syncing,
    /// the next cycle is stored at this channel index
    Capturing(usize),
}

/// Rebuilds CPPM frames from assembled cycles.
///
/// The checks run in a fixed order: noise rejection, then sync detection
/// (which overrides a frame in progress), then channel capture. Only whole
/// frames are ever returned.
pub struct CppmDecoder {
    config: CppmConfig,
    state: DecoderState,
    frame: Frame,
}

impl CppmDecoder {
    pub fn new(config: CppmConfig) -> Result<Self, RcInputError> {
        config.validate()?;

        Ok(Self {
            config,
            state: DecoderState::Idle,
            frame: Frame::default(),
        })
    }

    pub fn config(&self) -> &CppmConfig {
        &self.config
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    fn is_noise(&self, cycle: &Cycle) -> bool {
        !cycle.is_valid()
            || cycle.low_length >= self.config.low_limit_us
            || cycle.high_length <= self.config.low_limit_us
    }
}

impl PulseDecoder for CppmDecoder {
    fn max_channels(&self) -> usize {
        self.config.channel_count
    }

    fn decode(&mut self, cycle: &Cycle) -> DecodeEvent {
        if self.is_noise(cycle) {
            if self.state != DecoderState::Idle {
                debug!("CPPM cycle rejected mid frame: {}", cycle);
            }
            self.state = DecoderState::Idle;
            return DecodeEvent::Rejected;
        }

        if cycle.high_length >= self.config.sync_min_us {
            let restarted = self.state != DecoderState::Idle;
            if restarted {
                debug!("CPPM sync at {} restarted a partial frame", cycle.low_time);
            }
            self.frame = Frame::new(cycle.low_time, self.config.channel_count);
            self.state = DecoderState::Syncing;
            return DecodeEvent::Synced { restarted };
        }

        let channel = match self.state {
            DecoderState::Idle => return DecodeEvent::Ignored,
            DecoderState::Syncing => 0,
            DecoderState::Capturing(channel) => channel,
        };

        let Some(slot) = self.frame.channels.get_mut(channel) else {
            self.state = DecoderState::Idle;
            return DecodeEvent::Overflow;
        };
        *slot = i32::try_from(cycle.length()).unwrap_or(i32::MAX);

        if channel + 1 >= self.config.channel_count {
            self.state = DecoderState::Idle;
            return DecodeEvent::Completed(mem::take(&mut self.frame));
        }

        self.state = DecoderState::Capturing(channel + 1);
        DecodeEvent::Captured { channel }
    }

    fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.frame = Frame::default();
    }
}
