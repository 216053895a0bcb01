pub mod bus;
pub mod capture;
pub mod pca9685;
pub mod pwm_codec;
pub mod rc_input;
