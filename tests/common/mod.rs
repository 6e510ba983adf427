#![allow(dead_code)]

use std::f32::consts::PI;

/// Mono sine wave.
pub fn gen_sine(freq_hz: f32, sr: u32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * freq_hz * i as f32 / sr as f32).sin())
        .collect()
}

/// Deterministic white-ish noise from a 32-bit LCG, amplitude ±`amp`.
pub fn gen_noise(seed: u32, amp: f32, n: usize) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            ((state >> 16) as f32 / 32768.0 - 1.0) * amp
        })
        .collect()
}

/// Copy of `reference` delayed by `delay` samples, zero-padded at the
/// start and truncated to the reference length.
pub fn delayed_copy(reference: &[f32], delay: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; reference.len()];
    if delay < reference.len() {
        let kept = reference.len() - delay;
        out[delay..].copy_from_slice(&reference[..kept]);
    }
    out
}

/// Number of sign changes in a signal; proportional to the dominant
/// frequency for a tone.
pub fn zero_crossings(signal: &[f32]) -> usize {
    signal
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count()
}
