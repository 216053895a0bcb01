pub mod blocking;
pub mod moving_average;
