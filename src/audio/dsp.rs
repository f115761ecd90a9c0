//! Small numeric helpers shared by the analyzers and the smoothing stage.

use std::f32::consts::PI;

/// Guards divisions against silent frames.
pub const EPSILON: f32 = 1e-10;

/// Dynamic range kept by [`power_to_db`], in decibels.
pub const TOP_DB: f32 = 80.0;

/// Symmetric Hann window of `size` points.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

/// Root mean square of a block; zero for an empty block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Rescale `values` in place to [0, 1] against their own extrema.
///
/// A flat frame (including silence) maps to all zeros.
pub fn min_max_normalize(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if !(max > min) {
        values.fill(0.0);
        return;
    }

    let range = max - min + EPSILON;
    for v in values.iter_mut() {
        *v = ((*v - min) / range).clamp(0.0, 1.0);
    }
}

/// Convert power values to decibels relative to the frame maximum,
/// flooring everything more than [`TOP_DB`] below it.
pub fn power_to_db(power: &mut [f32]) {
    let reference = power.iter().copied().fold(0.0f32, f32::max).max(EPSILON);
    let ref_db = 10.0 * reference.log10();

    for p in power.iter_mut() {
        let db = 10.0 * p.max(EPSILON).log10() - ref_db;
        *p = db.max(-TOP_DB);
    }
}

/// Linearly interpolate `ys` (sampled at ascending `xs`) at `x`.
/// Values outside the sampled range take the nearest endpoint.
pub fn interp(x: f32, xs: &[f32], ys: &[f32]) -> f32 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    // Index of the first sample point strictly greater than x
    let upper = xs[..n].partition_point(|&v| v <= x);
    let lower = upper - 1;
    let span = xs[upper] - xs[lower];
    if span <= 0.0 {
        return ys[lower];
    }
    let t = (x - xs[lower]) / span;
    ys[lower] + (ys[upper] - ys[lower]) * t
}

/// Percentile of `values` using linear interpolation between closest ranks.
/// `scratch` is reused to avoid allocating on the audio thread.
pub fn percentile(values: impl Iterator<Item = f32>, pct: f32, scratch: &mut Vec<f32>) -> f32 {
    scratch.clear();
    scratch.extend(values);
    if scratch.is_empty() {
        return 0.0;
    }
    scratch.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (scratch.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f32;
    scratch[lower] + (scratch[upper] - scratch[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let window = hann_window(64);
        assert_approx(window[0], 0.0, 1e-6);
        assert_approx(window[63], 0.0, 1e-6);
        assert!(window[31] > 0.99);
    }

    #[test]
    fn rms_of_constant_block() {
        assert_approx(rms(&[0.5; 128]), 0.5, 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn normalize_maps_extrema_to_unit_range() {
        let mut values = vec![2.0, 4.0, 6.0];
        min_max_normalize(&mut values);
        assert_approx(values[0], 0.0, 1e-6);
        assert_approx(values[1], 0.5, 1e-6);
        assert_approx(values[2], 1.0, 1e-6);
    }

    #[test]
    fn normalize_flat_frame_is_silent() {
        let mut values = vec![0.0; 16];
        min_max_normalize(&mut values);
        assert!(values.iter().all(|&v| v == 0.0));

        let mut values = vec![3.0; 4];
        min_max_normalize(&mut values);
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn power_to_db_is_relative_and_floored() {
        let mut power = vec![1.0, 0.1, 0.0];
        power_to_db(&mut power);
        assert_approx(power[0], 0.0, 1e-4);
        assert_approx(power[1], -10.0, 1e-3);
        assert_approx(power[2], -TOP_DB, 1e-4);
    }

    #[test]
    fn interp_between_and_beyond_points() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 30.0];
        assert_approx(interp(0.5, &xs, &ys), 5.0, 1e-6);
        assert_approx(interp(1.5, &xs, &ys), 20.0, 1e-6);
        assert_approx(interp(-1.0, &xs, &ys), 0.0, 1e-6);
        assert_approx(interp(5.0, &xs, &ys), 30.0, 1e-6);
    }

    #[test]
    fn percentile_matches_linear_interpolation() {
        let mut scratch = Vec::new();
        let values = (1..=5).map(|v| v as f32);
        // rank = 0.85 * 4 = 3.4 -> 4 + 0.4 * (5 - 4)
        assert_approx(percentile(values, 85.0, &mut scratch), 4.4, 1e-5);
        assert_eq!(percentile(std::iter::empty(), 85.0, &mut scratch), 0.0);
    }
}
