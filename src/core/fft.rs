//! Fixed-size FFT transform pair for correlation processing.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// A planned forward/inverse transform pair of one fixed power-of-two size.
///
/// The forward transform is unscaled; the inverse scales by `1/n`. Keeping
/// the scaling on one side only means a forward/inverse round trip is the
/// identity and correlation peak magnitudes stay comparable across calls.
///
/// Scratch space is allocated once at planning time, so transforms never
/// allocate afterwards.
pub struct FixedFft {
    size: usize,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FixedFft {
    /// Plans transforms of the given size.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a power of two.
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "FFT size must be a power of two");
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(size);
        let inv = planner.plan_fft_inverse(size);
        let scratch_len = fwd
            .get_inplace_scratch_len()
            .max(inv.get_inplace_scratch_len());
        Self {
            size,
            fwd,
            inv,
            scratch: vec![COMPLEX_ZERO; scratch_len],
        }
    }

    /// Transform size in bins.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform (unscaled).
    pub fn forward(&mut self, buf: &mut [Complex<f32>]) {
        self.fwd.process_with_scratch(buf, &mut self.scratch);
    }

    /// In-place inverse transform, scaled by `1/n`.
    pub fn inverse(&mut self, buf: &mut [Complex<f32>]) {
        self.inv.process_with_scratch(buf, &mut self.scratch);
        let scale = 1.0 / self.size as f32;
        for v in buf.iter_mut() {
            *v *= scale;
        }
    }
}
