//! Error types for the RC input pipeline and the PWM output path.
//!
//! Decode-path conditions (noise, overflow, full queues) are not errors; they
//! show up in [`navio_interface::RcStats`] and the log instead.

use thiserror::Error;

use crate::drivers::rc_input::RcProtocol;

/// Bad arguments to the PWM channel codec
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("tick value {0} is outside 0..=4096")]
    TickOutOfRange(u16),

    #[error("pulse width {0} ticks is outside 0..=4095")]
    WidthOutOfRange(u32),

    #[error("delay {0} ticks is outside 0..=4095")]
    DelayOutOfRange(u32),

    #[error("frequency must be greater than zero")]
    InvalidFrequency,

    #[error("frequency does not map to a prescale within 3..=255")]
    PrescaleOutOfRange,

    #[error("clock speed {0} Hz is outside 1..=50000000")]
    InvalidClockSpeed(u32),

    #[error("channel index {0} is out of range")]
    ChannelOutOfRange(usize),

    #[error("channel register data needs 4 bytes, got {0}")]
    ShortRegisterData(usize),

    #[error("fixed point overflow")]
    Overflow,
}

/// Register bus collaborator failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("device did not acknowledge")]
    Nack,

    #[error("bus transfer failed")]
    Io,

    #[error("bus is busy")]
    Busy,
}

/// Pulse capture collaborator failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("an edge sink is already attached")]
    AlreadyAttached,

    #[error("GPIO pin {0} is not available")]
    PinUnavailable(u8),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcInputError {
    #[error("RC protocol {0:?} is not supported")]
    NotSupported(RcProtocol),

    #[error("invalid RC input configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("pulse capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("no frame subscriber slots left")]
    SubscriberLimit,

    #[error("failed to spawn an RC input worker")]
    WorkerSpawn,
}

/// PWM output driver failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("frequency is outside the range the prescale register allows")]
    FrequencyOutOfRange,
}
