//! Incremental WSOLA (Waveform Similarity Overlap-Add) time stretching.
//!
//! Changes the duration of audio without changing its pitch by re-splicing
//! overlapping windows of the original-rate signal. The splice point for
//! each frame is chosen by a cross-correlation search against the tail of
//! the previous frame, and the effective rate is encoded in how much input
//! is consumed per emitted frame. Audio is processed incrementally as it
//! arrives, which suits adaptive playout-rate control (jitter-buffer drift
//! compensation).

use tracing::{debug, warn};

use crate::core::ring_buffer::SampleRing;
use crate::core::types::{ProcessResult, Sample, StretcherState, TimeStretcherConfig};
use crate::core::window::hann_window;
use crate::error::DspError;
use crate::math;

/// Slowest supported rate.
pub const MIN_RATE: f32 = 0.5;
/// Fastest supported rate.
pub const MAX_RATE: f32 = 2.0;

const MAX_CHANNELS: u16 = 2;
/// Input ring capacity, in analysis windows.
const BUFFER_MARGIN: usize = 4;
/// Energy floor below which correlation is treated as zero.
const ENERGY_EPSILON: f64 = 1e-10;

/// Streaming WSOLA time stretcher.
///
/// Owns all of its state; feed interleaved samples through [`process`] and
/// change the rate at any time with [`set_rate`]. One instance per stream,
/// confined to the thread that owns the stream.
///
/// [`process`]: TimeStretcher::process
/// [`set_rate`]: TimeStretcher::set_rate
pub struct TimeStretcher {
    config: TimeStretcherConfig,

    // Derived sizing, in per-channel samples.
    frame_samples: usize,
    overlap_samples: usize,
    search_samples: usize,
    hop_in: usize,
    hop_out: usize,

    current_rate: f32,
    input_total: u64,
    output_total: u64,

    input_ring: SampleRing,
    /// Contiguous view of the ring front, refreshed once per frame.
    analysis: Vec<Sample>,
    /// Tail of the previous output frame, blended into the next frame head.
    ola_tail: Vec<Sample>,
    /// Tail of the previous frame, the target of the similarity search.
    correlation_ref: Vec<Sample>,
    /// Hann crossfade envelope, fixed at `overlap_samples` points.
    window: Vec<f32>,

    // Staging for the int16 entry points.
    conv_input: Vec<Sample>,
    conv_output: Vec<Sample>,

    first_frame: bool,
}

impl TimeStretcher {
    /// Creates a stretcher from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InvalidConfig`] if the channel count is not 1 or
    /// 2, the sample rate is outside [8000, 48000], the frame size computes
    /// to zero samples, or the initial rate is not finite.
    pub fn new(config: &TimeStretcherConfig) -> Result<Self, DspError> {
        if config.channels < 1 || config.channels > MAX_CHANNELS {
            return Err(DspError::InvalidConfig(format!(
                "channels must be 1 or 2, got {}",
                config.channels
            )));
        }
        if !(8000..=48000).contains(&config.sample_rate) {
            return Err(DspError::InvalidConfig(format!(
                "sample rate must be between 8000 and 48000, got {}",
                config.sample_rate
            )));
        }
        if !config.initial_rate.is_finite() {
            return Err(DspError::InvalidConfig(format!(
                "initial rate must be finite, got {}",
                config.initial_rate
            )));
        }

        let sr = config.sample_rate as usize;
        let frame_samples = sr * config.frame_size_ms as usize / 1000;
        if frame_samples == 0 {
            return Err(DspError::InvalidConfig(
                "frame size must be at least one sample".to_string(),
            ));
        }
        let mut overlap_samples = sr * config.overlap_ms as usize / 1000;
        let search_samples = sr * config.search_range_ms as usize / 1000;

        // An overlap as large as the frame leaves no fresh samples per hop.
        if overlap_samples >= frame_samples {
            overlap_samples = frame_samples / 2;
        }
        let hop_in = frame_samples - overlap_samples;

        let rate = config.initial_rate.clamp(MIN_RATE, MAX_RATE);
        let hop_out = ((hop_in as f32 / rate) as usize).max(1);

        let channels = config.channels as usize;
        let ring_capacity = (frame_samples + search_samples) * BUFFER_MARGIN * channels;
        let analysis_len = (frame_samples + search_samples) * channels;

        debug!(
            frame_samples,
            overlap_samples, search_samples, hop_in, ring_capacity, "created time stretcher"
        );

        Ok(Self {
            config: config.clone(),
            frame_samples,
            overlap_samples,
            search_samples,
            hop_in,
            hop_out,
            current_rate: rate,
            input_total: 0,
            output_total: 0,
            input_ring: SampleRing::with_capacity(ring_capacity),
            analysis: vec![0.0; analysis_len],
            ola_tail: vec![0.0; overlap_samples * channels],
            correlation_ref: vec![0.0; overlap_samples * channels],
            window: hann_window(overlap_samples),
            conv_input: vec![0.0; ring_capacity],
            conv_output: vec![0.0; ring_capacity],
            first_frame: true,
        })
    }

    /// Sets the stretch rate, clamped to [0.5, 2.0].
    ///
    /// Rates above 1.0 speed playback up (more input consumed per output
    /// frame); rates below 1.0 slow it down. Non-finite values are ignored.
    pub fn set_rate(&mut self, rate: f32) {
        if !rate.is_finite() {
            warn!(rate, "ignoring non-finite rate");
            return;
        }
        self.current_rate = rate.clamp(MIN_RATE, MAX_RATE);
        self.hop_out = ((self.hop_in as f32 / self.current_rate) as usize).max(1);
    }

    /// Current stretch rate.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.current_rate
    }

    /// Analysis frame size in per-channel samples.
    #[inline]
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Overlap length in per-channel samples.
    #[inline]
    pub fn overlap_samples(&self) -> usize {
        self.overlap_samples
    }

    /// Similarity search range in per-channel samples.
    #[inline]
    pub fn search_samples(&self) -> usize {
        self.search_samples
    }

    /// Expected output samples per input hop at the current rate.
    #[inline]
    pub fn output_hop(&self) -> usize {
        self.hop_out
    }

    /// Processes interleaved float samples.
    ///
    /// Input is appended to the internal ring; complete frames are then
    /// spliced into `output` until either the buffered input or the output
    /// capacity runs out. Unconsumed input stays buffered for the next call.
    ///
    /// The returned [`ProcessResult`] reports how much input was accepted:
    /// if `accepted < input.len()`, the ring was full and the excess was
    /// dropped — feed smaller chunks or drain output more often.
    pub fn process(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
    ) -> Result<ProcessResult, DspError> {
        let channels = self.config.channels as usize;

        let accepted = self.input_ring.push_slice(input);
        if accepted < input.len() {
            warn!(
                dropped = input.len() - accepted,
                "input ring full, truncating"
            );
        }
        self.input_total += (accepted / channels) as u64;

        let frame_len = self.frame_samples * channels;
        let overlap_len = self.overlap_samples * channels;
        let need = frame_len + self.search_samples * channels;

        let mut written = 0usize;
        while self.input_ring.len() >= need {
            // The frame is written in full, then the cursor advances by one
            // hop; the trailing overlap is re-blended by the next frame.
            if written + frame_len > output.len() {
                break;
            }

            let copied = self.input_ring.peek_slice(&mut self.analysis[..need]);
            debug_assert_eq!(copied, need);

            let offset = if self.first_frame { 0 } else { self.best_offset() };
            let start = offset * channels;

            let frame = &self.analysis[start..start + frame_len];
            let out = &mut output[written..written + frame_len];
            if self.first_frame {
                out.copy_from_slice(frame);
                self.first_frame = false;
            } else {
                overlap_add(
                    &mut out[..overlap_len],
                    &self.ola_tail,
                    &frame[..overlap_len],
                    &self.window,
                    channels,
                );
                out[overlap_len..].copy_from_slice(&frame[overlap_len..]);
            }

            let tail = &self.analysis[start + frame_len - overlap_len..start + frame_len];
            self.ola_tail.copy_from_slice(tail);
            self.correlation_ref.copy_from_slice(tail);

            written += frame_len - overlap_len;
            self.output_total += self.hop_in as u64;

            // Consuming hop * rate input per fixed-size output hop is what
            // realizes the speed change.
            let hop_len = self.hop_in * channels;
            let consume = ((hop_len as f32 * self.current_rate) as usize)
                .max(1)
                .min(self.input_ring.len());
            self.input_ring.discard(consume);
        }

        Ok(ProcessResult { accepted, written })
    }

    /// Processes interleaved int16 PCM samples.
    ///
    /// Converts through preallocated staging buffers and delegates to
    /// [`process`](TimeStretcher::process).
    ///
    /// # Errors
    ///
    /// Returns [`DspError::BufferTooLarge`] if `input` or `output` exceeds
    /// the staging capacity (the input ring capacity).
    pub fn process_i16(
        &mut self,
        input: &[i16],
        output: &mut [i16],
    ) -> Result<ProcessResult, DspError> {
        if input.len() > self.conv_input.len() {
            return Err(DspError::BufferTooLarge {
                provided: input.len(),
                capacity: self.conv_input.len(),
            });
        }
        if output.len() > self.conv_output.len() {
            return Err(DspError::BufferTooLarge {
                provided: output.len(),
                capacity: self.conv_output.len(),
            });
        }

        let mut conv_input = std::mem::take(&mut self.conv_input);
        let mut conv_output = std::mem::take(&mut self.conv_output);

        math::int16_to_float(input, &mut conv_input[..input.len()]);
        let result = self.process(&conv_input[..input.len()], &mut conv_output[..output.len()]);
        if let Ok(r) = &result {
            math::float_to_int16(&conv_output[..r.written], &mut output[..r.written]);
        }

        self.conv_input = conv_input;
        self.conv_output = conv_output;
        result
    }

    /// Drains remaining buffered input verbatim, as floats.
    ///
    /// No overlap-add is applied to the tail; this is the end-of-stream
    /// path. The ring is emptied even if `output` is smaller than the
    /// buffered amount. Returns the number of samples written.
    pub fn flush(&mut self, output: &mut [Sample]) -> usize {
        let written = self.input_ring.pop_slice(output);
        self.input_ring.clear();
        written
    }

    /// Drains remaining buffered input verbatim as int16 PCM, saturating.
    ///
    /// Same semantics as [`flush`](TimeStretcher::flush).
    pub fn flush_i16(&mut self, output: &mut [i16]) -> usize {
        let mut conv_output = std::mem::take(&mut self.conv_output);
        let limit = output.len().min(conv_output.len());
        let written = self.flush(&mut conv_output[..limit]);
        math::float_to_int16(&conv_output[..written], &mut output[..written]);
        self.conv_output = conv_output;
        written
    }

    /// Buffered-but-unprocessed input, in per-channel samples.
    pub fn buffered(&self) -> usize {
        self.input_ring.len() / self.config.channels as usize
    }

    /// Snapshot of rate, totals, and buffering latency.
    pub fn state(&self) -> StretcherState {
        StretcherState {
            current_rate: self.current_rate,
            input_samples: self.input_total,
            output_samples: self.output_total,
            latency_ms: self.buffered() as f32 / self.config.sample_rate as f32 * 1000.0,
        }
    }

    /// Clears all buffers and counters; the next call behaves as if the
    /// stretcher were newly created. No reallocation takes place.
    pub fn reset(&mut self) {
        self.input_ring.clear();
        self.analysis.fill(0.0);
        self.ola_tail.fill(0.0);
        self.correlation_ref.fill(0.0);
        self.input_total = 0;
        self.output_total = 0;
        self.first_frame = true;
    }

    /// Conservative output-buffer size for `input_count` samples at `rate`.
    ///
    /// Always at least the actual output produced for that much input, with
    /// a 25% margin plus a fixed constant. Non-finite rates are treated as
    /// 1.0; finite rates are clamped to [0.5, 2.0].
    pub fn output_size_hint(input_count: usize, rate: f32) -> usize {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        };
        let base = (input_count as f32 / rate) as usize;
        base + base / 4 + 256
    }

    /// Finds the frame offset whose head best continues the previous tail.
    ///
    /// Scans offsets 0..=search_samples over the analysis window and keeps
    /// the maximum normalized cross-correlation; ties go to the smallest
    /// offset. Offsets with non-positive correlation remain candidates.
    fn best_offset(&self) -> usize {
        let channels = self.config.channels as usize;
        let match_len = self.overlap_samples * channels;
        if match_len == 0 {
            return 0;
        }

        let mut best = 0usize;
        let mut best_corr = f64::NEG_INFINITY;
        for offset in 0..=self.search_samples {
            let start = offset * channels;
            if start + match_len > self.analysis.len() {
                break;
            }
            let corr = normalized_cross_correlation(
                &self.analysis[start..start + match_len],
                &self.correlation_ref,
            );
            if corr > best_corr {
                best_corr = corr;
                best = offset;
            }
        }
        best
    }
}

/// Crossfades `prev` into `next` over the overlap region.
///
/// `window` holds one weight per frame position; interleaved channels at
/// the same position share the weight.
fn overlap_add(
    out: &mut [Sample],
    prev: &[Sample],
    next: &[Sample],
    window: &[f32],
    channels: usize,
) {
    for (i, slot) in out.iter_mut().enumerate() {
        let w = window[i / channels];
        *slot = prev[i] * (1.0 - w) + next[i] * w;
    }
}

/// Normalized cross-correlation between two equal-length signals.
fn normalized_cross_correlation(a: &[Sample], b: &[Sample]) -> f64 {
    let denom = (math::energy(a) * math::energy(b)).sqrt();
    if denom < ENERGY_EPSILON {
        return 0.0;
    }
    math::dot(a, b) / denom
}
