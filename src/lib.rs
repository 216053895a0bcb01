//! RC receiver input and PWM output for the Navio autopilot board.
//!
//! The RC side turns GPIO edges from a CPPM receiver into channel frames on two
//! worker threads ([`drivers::rc_input::RcInput`]). The PWM side drives the
//! PCA9685 ([`drivers::pca9685::Pca9685`]) through the tick/width/time
//! conversions in [`drivers::pwm_codec`].

pub mod consts;
pub mod drivers;
pub mod error;
pub mod mock;
pub mod protocols;
pub mod shared;
pub mod tasks;
pub mod tools;

pub use navio_interface::{ChannelSnapshot, Channels, Frame, RcMessage, RcStats};
