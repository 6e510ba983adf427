//! Core buffers, windows, and FFT plumbing shared by the DSP components.

pub mod fft;
pub mod ring_buffer;
pub mod types;
pub mod window;

pub use types::*;
