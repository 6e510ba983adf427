//! Shared sample type, configuration structs, and result/state snapshots.

use serde::{Deserialize, Serialize};

/// A single audio sample (32-bit float, range -1.0 to 1.0).
pub type Sample = f32;

/// Configuration for [`TimeStretcher`](crate::TimeStretcher).
///
/// Frame, overlap, and search sizes are given in milliseconds and converted
/// to samples at construction. Defaults match a 16 kHz voice pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStretcherConfig {
    /// Sample rate in Hz (8000 to 48000).
    pub sample_rate: u32,
    /// Number of channels (1 or 2, interleaved).
    pub channels: u16,
    /// Analysis frame size in milliseconds.
    pub frame_size_ms: u32,
    /// Overlap-add crossfade length in milliseconds.
    pub overlap_ms: u32,
    /// Waveform-similarity search range in milliseconds.
    pub search_range_ms: u32,
    /// Initial stretch rate, clamped to [0.5, 2.0].
    pub initial_rate: f32,
}

impl Default for TimeStretcherConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_size_ms: 20,
            overlap_ms: 10,
            search_range_ms: 15,
            initial_rate: 1.0,
        }
    }
}

impl TimeStretcherConfig {
    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the number of channels.
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Set the analysis frame size in milliseconds.
    pub fn with_frame_size_ms(mut self, frame_size_ms: u32) -> Self {
        self.frame_size_ms = frame_size_ms;
        self
    }

    /// Set the overlap length in milliseconds.
    pub fn with_overlap_ms(mut self, overlap_ms: u32) -> Self {
        self.overlap_ms = overlap_ms;
        self
    }

    /// Set the similarity search range in milliseconds.
    pub fn with_search_range_ms(mut self, search_range_ms: u32) -> Self {
        self.search_range_ms = search_range_ms;
        self
    }

    /// Set the initial stretch rate.
    pub fn with_initial_rate(mut self, initial_rate: f32) -> Self {
        self.initial_rate = initial_rate;
        self
    }
}

/// Outcome of a [`TimeStretcher::process`](crate::TimeStretcher::process) call.
///
/// `accepted < input.len()` means the internal input ring was full and the
/// excess was dropped; the caller can re-feed the remainder after draining
/// more output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Input samples accepted into the internal buffer.
    pub accepted: usize,
    /// Samples written to the output buffer.
    pub written: usize,
}

/// Snapshot of a stretcher's progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretcherState {
    /// Current stretch rate.
    pub current_rate: f32,
    /// Total input samples consumed, per channel.
    pub input_samples: u64,
    /// Total output samples produced, per channel.
    pub output_samples: u64,
    /// Buffered-but-unprocessed input expressed in milliseconds.
    pub latency_ms: f32,
}

/// Configuration for [`DelayEstimator`](crate::DelayEstimator).
///
/// Defaults match a 16 kHz echo-canceller alignment use case: 512-sample
/// frames, up to 300 ms of delay, PHAT weighting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayEstimatorConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Analysis frame size in samples (at most 4096).
    pub frame_size: usize,
    /// Largest delay to search, in samples.
    pub max_delay_samples: usize,
    /// Smallest delay to search, in samples.
    pub min_delay_samples: usize,
    /// Number of estimates kept for smoothing and variance tracking.
    pub history_size: usize,
    /// Minimum confidence for an estimate to be considered valid.
    pub confidence_threshold: f32,
    /// Apply phase-transform weighting to the cross-spectrum.
    pub use_phat: bool,
}

impl Default for DelayEstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_size: 512,
            max_delay_samples: 4800,
            min_delay_samples: 0,
            history_size: 8,
            confidence_threshold: 0.3,
            use_phat: true,
        }
    }
}

impl DelayEstimatorConfig {
    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the analysis frame size in samples.
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Set the delay search range in samples.
    pub fn with_delay_range(mut self, min_delay_samples: usize, max_delay_samples: usize) -> Self {
        self.min_delay_samples = min_delay_samples;
        self.max_delay_samples = max_delay_samples;
        self
    }

    /// Set the smoothing history length.
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    /// Set the validity confidence threshold.
    pub fn with_confidence_threshold(mut self, confidence_threshold: f32) -> Self {
        self.confidence_threshold = confidence_threshold;
        self
    }

    /// Enable or disable PHAT weighting.
    pub fn with_phat(mut self, use_phat: bool) -> Self {
        self.use_phat = use_phat;
        self
    }
}

/// One delay estimate.
///
/// A `valid == false` result is not an error: it means the current frames
/// carried no usable alignment information (silence, diffuse correlation)
/// and `delay_samples` holds the previous smoothed estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayEstimate {
    /// Estimated delay in samples. Positive: capture lags the reference.
    pub delay_samples: i32,
    /// Estimated delay in milliseconds.
    pub delay_ms: f32,
    /// Peak-sharpness confidence in [0, 1].
    pub confidence: f32,
    /// Raw correlation value at the winning lag.
    pub correlation_peak: f32,
    /// Whether the confidence cleared the configured threshold.
    pub valid: bool,
}

/// Snapshot of an estimator's smoothed state and counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorState {
    /// Current smoothed delay, rounded to samples.
    pub current_delay: i32,
    /// Smoothed delay in milliseconds.
    pub average_delay_ms: f32,
    /// Variance of the history against the smoothed mean, in samples squared.
    pub delay_variance: f32,
    /// Estimates computed since creation or reset.
    pub total_estimates: u64,
    /// Estimates that cleared the confidence threshold.
    pub valid_estimates: u64,
}
