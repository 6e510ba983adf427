#![forbid(unsafe_code)]
//! Realtime voice DSP building blocks.
//!
//! `voicedsp` provides the two stateful correlation-driven components of a
//! voice processing pipeline: a WSOLA time stretcher for adaptive
//! playout-rate control, and a GCC-PHAT delay estimator for aligning an
//! echo canceller's reference signal with the microphone capture. Both are
//! single-threaded, allocation-free in steady state, and consume plain
//! int16 or float PCM buffers.
//!
//! # Time stretching
//!
//! ```
//! use voicedsp::{TimeStretcher, TimeStretcherConfig};
//!
//! // 1 second of 440 Hz sine at 16 kHz
//! let input: Vec<f32> = (0..16000)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin())
//!     .collect();
//!
//! let config = TimeStretcherConfig::default().with_initial_rate(1.25);
//! let mut stretcher = TimeStretcher::new(&config).unwrap();
//!
//! let mut output = vec![0.0f32; TimeStretcher::output_size_hint(input.len(), 1.25)];
//! let result = stretcher.process(&input, &mut output).unwrap();
//! assert!(result.written > 0);
//! ```
//!
//! # Delay estimation
//!
//! ```
//! use voicedsp::{DelayEstimator, DelayEstimatorConfig};
//!
//! let config = DelayEstimatorConfig::default()
//!     .with_frame_size(512)
//!     .with_delay_range(0, 160);
//! let mut estimator = DelayEstimator::new(&config).unwrap();
//!
//! // Capture is the reference shifted right by 40 samples.
//! let mut seed = 0x12345678u32;
//! let reference: Vec<f32> = (0..512)
//!     .map(|_| {
//!         seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
//!         (seed >> 16) as f32 / 32768.0 - 1.0
//!     })
//!     .collect();
//! let mut capture = vec![0.0f32; 512];
//! capture[40..].copy_from_slice(&reference[..472]);
//!
//! let estimate = estimator.estimate(&reference, &capture).unwrap();
//! assert_eq!(estimate.delay_samples, 40);
//! assert!(estimate.valid);
//! ```

pub mod core;
pub mod delay;
pub mod error;
pub mod math;
pub mod stretch;

pub use crate::core::types::{
    DelayEstimate, DelayEstimatorConfig, EstimatorState, ProcessResult, Sample, StretcherState,
    TimeStretcherConfig,
};
pub use crate::delay::DelayEstimator;
pub use crate::error::DspError;
pub use crate::stretch::TimeStretcher;

/// Stretches a whole buffer in one call.
///
/// Convenience wrapper for offline use: drives a [`TimeStretcher`] over
/// `input` at `config.initial_rate` and drains the unprocessed tail
/// verbatim at the end. For realtime use, hold a `TimeStretcher` and call
/// [`process`](TimeStretcher::process) per chunk instead.
///
/// # Errors
///
/// Returns [`DspError::InvalidConfig`] for the same configurations
/// [`TimeStretcher::new`] rejects.
pub fn stretch(input: &[Sample], config: &TimeStretcherConfig) -> Result<Vec<Sample>, DspError> {
    let mut stretcher = TimeStretcher::new(config)?;
    let rate = stretcher.rate();
    let channels = config.channels as usize;

    let mut output = vec![0.0; TimeStretcher::output_size_hint(input.len(), rate)];
    let mut written_total = 0;

    let chunk_len = 1024 * channels;
    for chunk in input.chunks(chunk_len) {
        let mut fed = 0;
        while fed < chunk.len() {
            let result = stretcher.process(&chunk[fed..], &mut output[written_total..])?;
            written_total += result.written;
            fed += result.accepted;
            if result.accepted == 0 && result.written == 0 {
                // Output capacity and ring both saturated; stop feeding.
                break;
            }
        }
    }

    let tail = stretcher.buffered() * channels;
    if written_total + tail > output.len() {
        output.resize(written_total + tail, 0.0);
    }
    written_total += stretcher.flush(&mut output[written_total..]);

    output.truncate(written_total);
    Ok(output)
}
