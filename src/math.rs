//! Scalar numeric kernels shared by the DSP components.
//!
//! Bulk sample-format conversion and vector arithmetic, written as exact
//! reference implementations: results do not depend on the platform, and a
//! vectorized backend would have to match them bit-for-bit on conversions
//! and saturation.

use rustfft::num_complex::Complex;

/// Full-scale factor between int16 PCM and normalized float.
const INT16_SCALE: f32 = 32768.0;

/// Converts int16 PCM to float in [-1.0, 1.0].
pub fn int16_to_float(src: &[i16], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f32::from(s) / INT16_SCALE;
    }
}

/// Converts float samples to int16 PCM, rounding to nearest and saturating.
pub fn float_to_int16(src: &[f32], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s * INT16_SCALE).round().clamp(-32768.0, 32767.0) as i16;
    }
}

/// Applies a gain factor in place.
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Sum of squares of a signal, accumulated in f64.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Dot product of two signals, accumulated in f64.
///
/// Truncates to the shorter of the two slices.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64) * (y as f64))
        .sum()
}

/// Elementwise `a * conj(b)` into `out`.
pub fn complex_mul_conj(a: &[Complex<f32>], b: &[Complex<f32>], out: &mut [Complex<f32>]) {
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = x * y.conj();
    }
}

/// Normalizes each bin to unit magnitude, flooring the magnitude at `floor`.
///
/// The floor keeps near-silent bins from blowing up the division; they end
/// up attenuated toward zero instead of amplified.
pub fn complex_normalize(bins: &mut [Complex<f32>], floor: f32) {
    for v in bins.iter_mut() {
        let mag = v.norm().max(floor);
        *v /= mag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int16_float_round_trip() {
        let src: Vec<i16> = vec![0, 1, -1, 12345, -12345, 32767, -32768];
        let mut floats = vec![0.0f32; src.len()];
        let mut back = vec![0i16; src.len()];
        int16_to_float(&src, &mut floats);
        float_to_int16(&floats, &mut back);
        assert_eq!(src, back);
    }

    #[test]
    fn float_to_int16_saturates() {
        let src = vec![1.5f32, -1.5, 1.0, -1.0];
        let mut dst = vec![0i16; 4];
        float_to_int16(&src, &mut dst);
        assert_eq!(dst, vec![32767, -32768, 32767, -32768]);
    }

    #[test]
    fn energy_and_peak() {
        let samples = vec![0.5f32, -0.5, 0.25];
        assert!((energy(&samples) - 0.5625).abs() < 1e-9);
        assert_eq!(peak(&samples), 0.5);
        assert_eq!(peak(&[]), 0.0);
    }

    #[test]
    fn dot_matches_manual_sum() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![4.0f32, 5.0, 6.0];
        assert!((dot(&a, &b) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn gain_in_place() {
        let mut samples = vec![1.0f32, -2.0, 0.5];
        apply_gain(&mut samples, 0.5);
        assert_eq!(samples, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn mul_conj_and_normalize() {
        let a = vec![Complex::new(0.0f32, 2.0)];
        let b = vec![Complex::new(0.0f32, 1.0)];
        let mut out = vec![Complex::new(0.0f32, 0.0)];
        complex_mul_conj(&a, &b, &mut out);
        // (2i) * conj(i) = (2i)(-i) = 2
        assert!((out[0].re - 2.0).abs() < 1e-6);
        assert!(out[0].im.abs() < 1e-6);

        complex_normalize(&mut out, 1e-8);
        assert!((out[0].norm() - 1.0).abs() < 1e-6);

        // A bin below the floor shrinks instead of blowing up.
        let mut tiny = vec![Complex::new(1e-12f32, 0.0)];
        complex_normalize(&mut tiny, 1e-8);
        assert!(tiny[0].norm() < 1e-3);
    }
}
