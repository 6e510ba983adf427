//! GCC-PHAT delay estimation between reference and capture signals.
//!
//! Estimates the time offset at which a captured (microphone) signal best
//! aligns with a reference (playback) signal, via FFT-based generalized
//! cross-correlation. With PHAT weighting the cross-spectrum is whitened
//! bin-by-bin before the inverse transform, which sharpens the correlation
//! peak and makes the estimate robust to reverberant and colored spectra.
//! Estimates are smoothed over a confidence-weighted history, so one noisy
//! frame does not move the reported delay.

use rustfft::num_complex::Complex;
use tracing::debug;

use crate::core::fft::{FixedFft, COMPLEX_ZERO};
use crate::core::types::{DelayEstimate, DelayEstimatorConfig, EstimatorState};
use crate::error::DspError;
use crate::math;

/// Hard cap on the analysis frame size.
pub const MAX_FRAME_SIZE: usize = 4096;

/// Shared epsilon: PHAT magnitude floor, signal-energy gate, and the
/// confidence denominators all use this constant so near-silence behaves
/// consistently across the pipeline.
const MIN_ENERGY: f32 = 1e-8;
/// Variance ceiling (samples squared) for a stable estimate.
const STABILITY_VARIANCE: f32 = 100.0;
/// Lags closer than this to the primary peak do not count as a runner-up.
const SECOND_PEAK_DISTANCE: i64 = 10;

#[derive(Debug, Clone, Copy, Default)]
struct HistoryEntry {
    delay: i32,
    confidence: f32,
}

/// Streaming GCC-PHAT delay estimator.
///
/// All FFT and correlation buffers are sized once at construction; steady
/// state estimation never allocates. One instance per stream, confined to
/// the thread that owns the stream.
pub struct DelayEstimator {
    config: DelayEstimatorConfig,
    fft_size: usize,
    fft: FixedFft,

    ref_spec: Vec<Complex<f32>>,
    cap_spec: Vec<Complex<f32>>,
    cross: Vec<Complex<f32>>,
    correlation: Vec<f32>,
    /// Most recent correlation, retained for inspection.
    last_correlation: Vec<f32>,

    history: Vec<HistoryEntry>,
    history_index: usize,
    history_count: usize,

    current_delay: i32,
    smoothed_delay: f32,
    total_estimates: u64,
    valid_estimates: u64,

    // Staging for the int16 entry point.
    conv_ref: Vec<f32>,
    conv_cap: Vec<f32>,
}

impl DelayEstimator {
    /// Creates an estimator from the given configuration.
    ///
    /// The FFT size is fixed here as the smallest power of two that covers
    /// both twice the frame size and twice the maximum delay, so the
    /// correlation of a full frame at the largest searched lag cannot wrap
    /// into the searched range.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InvalidConfig`] if the frame size is zero or
    /// exceeds [`MAX_FRAME_SIZE`], the sample rate is zero, the history is
    /// empty, the delay range is inverted, or the confidence threshold is
    /// outside [0, 1].
    pub fn new(config: &DelayEstimatorConfig) -> Result<Self, DspError> {
        if config.frame_size == 0 || config.frame_size > MAX_FRAME_SIZE {
            return Err(DspError::InvalidConfig(format!(
                "frame size must be between 1 and {}, got {}",
                MAX_FRAME_SIZE, config.frame_size
            )));
        }
        if config.sample_rate == 0 {
            return Err(DspError::InvalidConfig(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if config.history_size == 0 {
            return Err(DspError::InvalidConfig(
                "history size must be at least 1".to_string(),
            ));
        }
        if config.min_delay_samples > config.max_delay_samples {
            return Err(DspError::InvalidConfig(format!(
                "min delay {} exceeds max delay {}",
                config.min_delay_samples, config.max_delay_samples
            )));
        }
        if !config.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&config.confidence_threshold)
        {
            return Err(DspError::InvalidConfig(format!(
                "confidence threshold must be in [0, 1], got {}",
                config.confidence_threshold
            )));
        }

        let fft_size = (config.frame_size * 2)
            .max(config.max_delay_samples * 2)
            .next_power_of_two();

        debug!(fft_size, "created delay estimator");

        Ok(Self {
            config: config.clone(),
            fft_size,
            fft: FixedFft::new(fft_size),
            ref_spec: vec![COMPLEX_ZERO; fft_size],
            cap_spec: vec![COMPLEX_ZERO; fft_size],
            cross: vec![COMPLEX_ZERO; fft_size],
            correlation: vec![0.0; fft_size],
            last_correlation: vec![0.0; fft_size],
            history: vec![HistoryEntry::default(); config.history_size],
            history_index: 0,
            history_count: 0,
            current_delay: 0,
            smoothed_delay: 0.0,
            total_estimates: 0,
            valid_estimates: 0,
            conv_ref: vec![0.0; fft_size],
            conv_cap: vec![0.0; fft_size],
        })
    }

    /// FFT size in bins (always a power of two).
    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Estimates the delay between float reference and capture frames.
    ///
    /// When either signal is below the energy gate the previous smoothed
    /// delay is returned with `confidence = 0` and `valid = false`; no
    /// history or counters change. A low-confidence but computed estimate
    /// also leaves the smoothed delay untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InvalidInput`] if the slices differ in length,
    /// or [`DspError::BufferTooLarge`] if they exceed the FFT size.
    pub fn estimate(
        &mut self,
        reference: &[f32],
        capture: &[f32],
    ) -> Result<DelayEstimate, DspError> {
        if reference.len() != capture.len() {
            return Err(DspError::InvalidInput(format!(
                "reference length {} does not match capture length {}",
                reference.len(),
                capture.len()
            )));
        }
        if reference.len() > self.fft_size {
            return Err(DspError::BufferTooLarge {
                provided: reference.len(),
                capacity: self.fft_size,
            });
        }

        if math::energy(reference) < MIN_ENERGY as f64 || math::energy(capture) < MIN_ENERGY as f64
        {
            return Ok(self.holdover());
        }

        self.cross_correlate(reference, capture);
        let result = self.peak_estimate();
        self.last_correlation.copy_from_slice(&self.correlation);

        if result.valid {
            self.push_history(result.delay_samples, result.confidence);
            self.refresh_smoothed();
            self.valid_estimates += 1;
        }
        self.total_estimates += 1;

        Ok(result)
    }

    /// Estimates the delay between int16 reference and capture frames.
    ///
    /// Converts through preallocated staging buffers and delegates to
    /// [`estimate`](DelayEstimator::estimate).
    pub fn estimate_i16(
        &mut self,
        reference: &[i16],
        capture: &[i16],
    ) -> Result<DelayEstimate, DspError> {
        if reference.len() != capture.len() {
            return Err(DspError::InvalidInput(format!(
                "reference length {} does not match capture length {}",
                reference.len(),
                capture.len()
            )));
        }
        if reference.len() > self.conv_ref.len() {
            return Err(DspError::BufferTooLarge {
                provided: reference.len(),
                capacity: self.conv_ref.len(),
            });
        }

        let mut conv_ref = std::mem::take(&mut self.conv_ref);
        let mut conv_cap = std::mem::take(&mut self.conv_cap);
        math::int16_to_float(reference, &mut conv_ref[..reference.len()]);
        math::int16_to_float(capture, &mut conv_cap[..capture.len()]);
        let result = self.estimate(&conv_ref[..reference.len()], &conv_cap[..capture.len()]);
        self.conv_ref = conv_ref;
        self.conv_cap = conv_cap;
        result
    }

    /// Current smoothed delay in samples.
    #[inline]
    pub fn delay(&self) -> i32 {
        self.current_delay
    }

    /// Current smoothed delay in milliseconds.
    #[inline]
    pub fn delay_ms(&self) -> f32 {
        self.current_delay as f32 / self.config.sample_rate as f32 * 1000.0
    }

    /// Forces the delay to an externally known value.
    ///
    /// Fills the whole history with the value at confidence 1.0, so the
    /// estimator reports it as stable immediately. Used when a driver or
    /// transport reports the latency directly.
    pub fn set_delay(&mut self, delay_samples: i32) {
        self.current_delay = delay_samples;
        self.smoothed_delay = delay_samples as f32;
        for entry in self.history.iter_mut() {
            *entry = HistoryEntry {
                delay: delay_samples,
                confidence: 1.0,
            };
        }
        self.history_count = self.history.len();
        debug!(delay_samples, "delay estimate overridden");
    }

    /// Snapshot of the smoothed state, variance, and counters.
    pub fn state(&self) -> EstimatorState {
        let delay_variance = if self.history_count > 1 {
            let mean = self.smoothed_delay;
            let mut acc = 0.0f32;
            for entry in &self.history[..self.history_count] {
                let diff = entry.delay as f32 - mean;
                acc += diff * diff;
            }
            acc / self.history_count as f32
        } else {
            0.0
        };

        EstimatorState {
            current_delay: self.current_delay,
            average_delay_ms: self.smoothed_delay / self.config.sample_rate as f32 * 1000.0,
            delay_variance,
            total_estimates: self.total_estimates,
            valid_estimates: self.valid_estimates,
        }
    }

    /// True when the history is at least half full and its variance is
    /// below 100 samples squared.
    pub fn is_stable(&self) -> bool {
        if self.history_count < self.config.history_size / 2 {
            return false;
        }
        self.state().delay_variance < STABILITY_VARIANCE
    }

    /// The most recent correlation-vs-lag vector, for diagnostics.
    ///
    /// Index `i` holds lag `i` for `i < fft_size / 2` and lag `i - fft_size`
    /// above that (the usual wrapped FFT layout).
    pub fn correlation(&self) -> &[f32] {
        &self.last_correlation
    }

    /// Clears history and counters without reallocating buffers.
    pub fn reset(&mut self) {
        self.current_delay = 0;
        self.smoothed_delay = 0.0;
        self.total_estimates = 0;
        self.valid_estimates = 0;
        self.history_index = 0;
        self.history_count = 0;
        self.history.fill(HistoryEntry::default());
        self.last_correlation.fill(0.0);
    }

    /// Previous smoothed delay wrapped as a no-information result.
    fn holdover(&self) -> DelayEstimate {
        DelayEstimate {
            delay_samples: self.current_delay,
            delay_ms: self.current_delay as f32 / self.config.sample_rate as f32 * 1000.0,
            confidence: 0.0,
            correlation_peak: 0.0,
            valid: false,
        }
    }

    /// Computes the (optionally PHAT-weighted) cross-correlation into
    /// `self.correlation`.
    fn cross_correlate(&mut self, reference: &[f32], capture: &[f32]) {
        self.ref_spec.fill(COMPLEX_ZERO);
        self.cap_spec.fill(COMPLEX_ZERO);
        for (slot, &s) in self.ref_spec.iter_mut().zip(reference) {
            slot.re = s;
        }
        for (slot, &s) in self.cap_spec.iter_mut().zip(capture) {
            slot.re = s;
        }

        self.fft.forward(&mut self.ref_spec);
        self.fft.forward(&mut self.cap_spec);

        // Capture x conj(reference): a positive peak lag means the capture
        // lags the reference.
        math::complex_mul_conj(&self.cap_spec, &self.ref_spec, &mut self.cross);

        if self.config.use_phat {
            math::complex_normalize(&mut self.cross, MIN_ENERGY);
        }

        self.fft.inverse(&mut self.cross);
        for (out, v) in self.correlation.iter_mut().zip(&self.cross) {
            *out = v.re;
        }
    }

    /// Finds the correlation peak in the searched lag range and scores it.
    fn peak_estimate(&self) -> DelayEstimate {
        let n = self.fft_size;
        let min_delay = self.config.min_delay_samples;
        let max_delay = self.config.max_delay_samples;

        let mut peak = f32::NEG_INFINITY;
        let mut peak_lag: i64 = 0;

        // Positive lags: capture lags the reference.
        for lag in min_delay..=max_delay {
            if lag >= n {
                break;
            }
            let val = self.correlation[lag];
            if val > peak {
                peak = val;
                peak_lag = lag as i64;
            }
        }

        // Negative lags live at the wrapped end of the correlation.
        for lag in min_delay.max(1)..=max_delay.min(n.saturating_sub(1)) {
            let val = self.correlation[n - lag];
            if val > peak {
                peak = val;
                peak_lag = -(lag as i64);
            }
        }

        let peak_idx = if peak_lag >= 0 {
            peak_lag as usize
        } else {
            n - peak_lag.unsigned_abs() as usize
        };

        // Runner-up peak away from the primary one; a sharp, isolated peak
        // scores close to 1, a diffuse correlation close to 0.5.
        let mut second = f32::NEG_INFINITY;
        for (i, &val) in self.correlation.iter().enumerate() {
            let dist = (i as i64 - peak_idx as i64).abs();
            if dist > SECOND_PEAK_DISTANCE && val > second {
                second = val;
            }
        }

        let confidence = if second > MIN_ENERGY {
            peak / (peak + second)
        } else if peak > MIN_ENERGY {
            1.0
        } else {
            0.0
        };

        DelayEstimate {
            delay_samples: peak_lag as i32,
            delay_ms: peak_lag as f32 / self.config.sample_rate as f32 * 1000.0,
            confidence,
            correlation_peak: peak,
            valid: confidence >= self.config.confidence_threshold,
        }
    }

    fn push_history(&mut self, delay: i32, confidence: f32) {
        self.history[self.history_index] = HistoryEntry { delay, confidence };
        self.history_index = (self.history_index + 1) % self.history.len();
        if self.history_count < self.history.len() {
            self.history_count += 1;
        }
    }

    /// Recomputes the smoothed delay as the confidence-weighted mean of
    /// history entries above the threshold. Entries at or below the
    /// threshold are excluded entirely, not down-weighted.
    fn refresh_smoothed(&mut self) {
        let mut weighted_sum = 0.0f32;
        let mut total_weight = 0.0f32;
        for entry in &self.history[..self.history_count] {
            if entry.confidence > self.config.confidence_threshold {
                weighted_sum += entry.delay as f32 * entry.confidence;
                total_weight += entry.confidence;
            }
        }
        if total_weight > 0.0 {
            self.smoothed_delay = weighted_sum / total_weight;
            self.current_delay = self.smoothed_delay.round() as i32;
        }
    }
}
