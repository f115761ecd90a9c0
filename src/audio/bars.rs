use std::f32::consts::PI;

use super::analyzer::Analysis;
use super::settings::ProcessorSettings;
use crate::config::{Backend, VisualizationMode};

/// Minimum number of bars given to the bass group in mirrored layouts
const MIN_BASS_BARS: usize = 4;

/// Turns one analysis frame into a bar-count target array.
///
/// Stages run in a fixed order: aggregation, peak shaping, layout, accent
/// boost, then the optional EQ curve. The result is always `bar_count` long
/// and within [0, 1].
#[derive(Debug, Clone)]
pub struct BarMapper {
    bar_count: usize,
    peak_sharpness: f32,
    mode: VisualizationMode,
    /// Per-bar gain of the glava backend
    curve: Option<Vec<f32>>,
    grouped: Vec<f32>,
}

impl BarMapper {
    pub fn new(settings: &ProcessorSettings) -> Self {
        let curve = match settings.backend {
            Backend::Internal => None,
            Backend::Glava => Some(eq_curve(settings.bar_count)),
        };

        Self {
            bar_count: settings.bar_count,
            peak_sharpness: settings.peak_sharpness,
            mode: settings.visualization_mode,
            curve,
            grouped: vec![0.0; settings.bar_count],
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Map `analysis` into `target`, which must hold `bar_count` values.
    pub fn map(&mut self, analysis: &Analysis, accent: f32, target: &mut [f32]) {
        debug_assert_eq!(target.len(), self.bar_count);

        match analysis.frame() {
            Some(frame) => aggregate(&frame.magnitudes, &mut self.grouped),
            None => self.grouped.fill(0.0),
        }

        for v in self.grouped.iter_mut() {
            *v = shape_peak(*v, self.peak_sharpness);
        }

        apply_layout(self.mode, &self.grouped, target);

        for v in target.iter_mut() {
            *v = (*v * accent).clamp(0.0, 1.0);
        }

        if let Some(curve) = &self.curve {
            for (v, gain) in target.iter_mut().zip(curve) {
                *v = (*v * gain).clamp(0.0, 1.0);
            }
        }
    }
}

/// Contrast then compress: `sqrt(v ^ sharpness)`.
fn shape_peak(value: f32, sharpness: f32) -> f32 {
    let shaped = value.max(0.0).powf(sharpness).sqrt();
    if shaped.is_finite() {
        shaped
    } else {
        0.0
    }
}

/// Mean of equal-width index groups; bins short of `out.len()` are copied
/// and the rest zero-filled.
pub(crate) fn aggregate(bins: &[f32], out: &mut [f32]) {
    let bar_count = out.len();
    let total = bins.len();

    if total < bar_count {
        out[..total].copy_from_slice(bins);
        out[total..].fill(0.0);
        return;
    }

    for (i, slot) in out.iter_mut().enumerate() {
        let a = i * total / bar_count;
        let b = (i + 1) * total / bar_count;
        *slot = if b > a {
            bins[a..b].iter().sum::<f32>() / (b - a) as f32
        } else {
            0.0
        };
    }
}

/// Rearrange ascending-frequency `values` into `out` according to `mode`.
pub(crate) fn apply_layout(mode: VisualizationMode, values: &[f32], out: &mut [f32]) {
    let n = out.len();
    let bass_count = MIN_BASS_BARS.max(n / 12).min(values.len());
    let bass = &values[..bass_count];

    let mut arranged: Vec<f32> = Vec::with_capacity(n);
    match mode {
        VisualizationMode::Linear => arranged.extend_from_slice(values),
        VisualizationMode::BassCenter => {
            let side_count = n.saturating_sub(bass_count) / 2;
            let side = &values[bass_count..(bass_count + side_count).min(values.len())];
            arranged.extend(side.iter().rev());
            arranged.extend_from_slice(bass);
            arranged.extend_from_slice(side);
        }
        VisualizationMode::BassEdges => {
            let center_count = n.saturating_sub(bass_count * 2);
            let center = &values[bass_count..(bass_count + center_count).min(values.len())];
            arranged.extend_from_slice(bass);
            arranged.extend_from_slice(center);
            arranged.extend(bass.iter().rev());
        }
    }

    arranged.resize(n, 0.0);
    out.copy_from_slice(&arranged);
}

/// Gentle lift in the middle of the array: `0.8 + 0.4 * sin(pi * x)` over
/// `x` in [0, 1].
fn eq_curve(bar_count: usize) -> Vec<f32> {
    if bar_count == 1 {
        return vec![0.8];
    }
    (0..bar_count)
        .map(|i| {
            let x = i as f32 / (bar_count - 1) as f32;
            0.8 + 0.4 * (PI * x).sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analyzer::SpectralFrame;
    use crate::config::AudioConfig;

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    fn mapper(config: AudioConfig) -> BarMapper {
        BarMapper::new(&ProcessorSettings::from_config(&config).unwrap())
    }

    fn frame(magnitudes: Vec<f32>) -> Analysis {
        let frequencies = (0..magnitudes.len()).map(|i| 100.0 + i as f32).collect();
        Analysis::Frame(SpectralFrame {
            magnitudes,
            frequencies,
        })
    }

    fn ramp(n: usize) -> Vec<f32> {
        (1..=n).map(|v| v as f32).collect()
    }

    #[test]
    fn bass_edges_mirrors_low_bars_outward() {
        let mut out = vec![0.0; 12];
        apply_layout(VisualizationMode::BassEdges, &ramp(12), &mut out);
        assert_eq!(
            out,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 4.0, 3.0, 2.0, 1.0]
        );
    }

    #[test]
    fn bass_center_mirrors_high_bars_outward() {
        let mut out = vec![0.0; 12];
        apply_layout(VisualizationMode::BassCenter, &ramp(12), &mut out);
        assert_eq!(
            out,
            vec![8.0, 7.0, 6.0, 5.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn bass_center_pads_odd_remainder() {
        // bass 4, side (11 - 4) / 2 = 3, one slot left over
        let mut out = vec![9.0; 11];
        apply_layout(VisualizationMode::BassCenter, &ramp(11), &mut out);
        assert_eq!(
            out,
            vec![7.0, 6.0, 5.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0]
        );
    }

    #[test]
    fn layouts_survive_tiny_bar_counts() {
        for mode in [
            VisualizationMode::Linear,
            VisualizationMode::BassCenter,
            VisualizationMode::BassEdges,
        ] {
            for n in 1..6 {
                let mut out = vec![0.0; n];
                apply_layout(mode, &ramp(n), &mut out);
                assert_eq!(out.len(), n);
            }
        }
    }

    #[test]
    fn aggregation_averages_equal_groups() {
        let mut out = vec![0.0; 3];
        aggregate(&[1.0, 3.0, 2.0, 4.0, 0.0, 0.0, 1.0], &mut out);
        // boundaries 0, 2, 4, 7
        assert_eq!(out[0], 2.0);
        assert_eq!(out[1], 3.0);
        assert_approx(out[2], 1.0 / 3.0, 1e-6);
    }

    #[test]
    fn aggregation_zero_pads_short_input() {
        let mut out = vec![9.0; 5];
        aggregate(&[0.5, 0.25], &mut out);
        assert_eq!(out, vec![0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn degenerate_analysis_maps_to_zeros() {
        let mut mapper = mapper(AudioConfig {
            bar_count: 8,
            ..AudioConfig::default()
        });
        let mut target = vec![1.0; 8];
        mapper.map(&Analysis::Degenerate, 4.0, &mut target);
        assert!(target.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn peak_shaping_applies_sharpness() {
        let mut mapper = mapper(AudioConfig {
            bar_count: 2,
            peak_sharpness: 2.0,
            visualization_mode: VisualizationMode::Linear,
            ..AudioConfig::default()
        });
        let mut target = vec![0.0; 2];
        mapper.map(&frame(vec![0.25, 0.81]), 1.0, &mut target);
        // sqrt(v^2) = v
        assert_approx(target[0], 0.25, 1e-6);
        assert_approx(target[1], 0.81, 1e-6);

        let mut mapper = self::mapper(AudioConfig {
            bar_count: 1,
            peak_sharpness: 4.0,
            visualization_mode: VisualizationMode::Linear,
            ..AudioConfig::default()
        });
        let mut target = vec![0.0; 1];
        mapper.map(&frame(vec![0.5]), 1.0, &mut target);
        assert_approx(target[0], 0.25, 1e-6);
    }

    #[test]
    fn accent_boost_is_clamped() {
        let mut mapper = mapper(AudioConfig {
            bar_count: 2,
            peak_sharpness: 2.0,
            visualization_mode: VisualizationMode::Linear,
            ..AudioConfig::default()
        });
        let mut target = vec![0.0; 2];
        mapper.map(&frame(vec![0.2, 0.6]), 3.0, &mut target);
        assert_approx(target[0], 0.6, 1e-6);
        assert_eq!(target[1], 1.0);
    }

    #[test]
    fn glava_curve_lifts_the_middle() {
        let curve = eq_curve(5);
        assert_approx(curve[0], 0.8, 1e-6);
        assert_approx(curve[2], 1.2, 1e-6);
        assert_approx(curve[4], 0.8, 1e-5);

        let mut mapper = mapper(AudioConfig {
            bar_count: 5,
            peak_sharpness: 2.0,
            visualization_mode: VisualizationMode::Linear,
            backend: Backend::Glava,
            ..AudioConfig::default()
        });
        let mut target = vec![0.0; 5];
        mapper.map(&frame(vec![0.5; 5]), 1.0, &mut target);
        assert_approx(target[0], 0.4, 1e-6);
        assert_approx(target[2], 0.6, 1e-6);
        assert!(target.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
