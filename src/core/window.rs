//! Window functions for overlap-add splicing.

use std::f64::consts::PI;

/// Generates a Hann window.
///
/// Used as the crossfade envelope when splicing analysis frames: the
/// previous tail is weighted by `1 - w` and the incoming head by `w`,
/// which sums to unity at every point of the overlap.
pub fn hann_window(size: usize) -> Vec<f32> {
    match size {
        0 => return vec![],
        1 => return vec![1.0],
        _ => {}
    }
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = (2.0 * PI * i as f64) / (n - 1.0);
            (0.5 * (1.0 - x.cos())) as f32
        })
        .collect()
}
