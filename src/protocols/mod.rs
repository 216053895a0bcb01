pub mod cppm;
pub mod pwm;
