//! Delay estimation for echo-canceller reference alignment.

pub mod gcc_phat;

pub use gcc_phat::DelayEstimator;
