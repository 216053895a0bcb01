//! Mock collaborators for exercising the RC input pipeline and the PWM driver
//! on a host without Navio hardware.
//!
//! Available in this crate's unit tests and, for downstream crates, behind the
//! `mock` feature.

#![cfg(any(test, feature = "mock"))]

mod capture;
mod clock;
mod register_bus;

pub use capture::MockPulseCapture;
pub use clock::MockClock;
pub use register_bus::MockRegisterBus;
