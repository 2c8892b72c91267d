//! Mathematical helpers for filtering and refinement.

/// Builds a normalised 1D Gaussian kernel with radius `ceil(3 * sigma)`.
///
/// Non-positive or non-finite sigmas yield the identity kernel `[1.0]`.
pub(crate) fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil().max(1.0) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }
    taps
}
