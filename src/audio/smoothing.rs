use super::dsp;
use super::ring::History;
use super::settings::ProcessorSettings;

/// Depth of the per-cycle peak history used for adaptive gain
pub const PEAK_HISTORY: usize = 60;

/// Percentile of the peak history taken as the gain reference
const PEAK_PERCENTILE: f32 = 85.0;

/// Gain is only normalized once the reference peak exceeds this
const ADAPTIVE_GAIN_THRESHOLD: f32 = 0.2;

const PEAK_EPSILON: f32 = 1e-9;

/// Temporal smoothing from per-cycle targets to the committed bar array.
///
/// Each step blends toward the target, limits how far a bar can move,
/// averages over recent cycles, normalizes against recent loudness and
/// finally gates out noise. The committed array is what consumers see.
#[derive(Debug, Clone)]
pub struct SmoothingEngine {
    alpha: f32,
    max_change: f32,
    noise_floor: f32,
    bars: Vec<f32>,
    history: History<Vec<f32>>,
    peaks: History<f32>,
    averaged: Vec<f32>,
    /// Buffer recycled from the oldest history entry
    spare: Option<Vec<f32>>,
    percentile_scratch: Vec<f32>,
}

impl SmoothingEngine {
    pub fn new(settings: &ProcessorSettings) -> Self {
        let n = settings.bar_count;
        Self {
            alpha: settings.exp_smooth_factor,
            max_change: settings.max_change_speed,
            noise_floor: settings.noise_floor,
            bars: vec![0.0; n],
            history: History::filled(settings.avg_window_size, vec![0.0; n]),
            peaks: History::new(PEAK_HISTORY),
            averaged: vec![0.0; n],
            spare: None,
            percentile_scratch: Vec::with_capacity(PEAK_HISTORY),
        }
    }

    /// The committed bar array.
    pub fn bars(&self) -> &[f32] {
        &self.bars
    }

    /// Advance one cycle toward `target`.
    pub fn step(&mut self, target: &[f32]) {
        let n = self.bars.len();
        debug_assert_eq!(target.len(), n);

        let mut updated = self.spare.take().unwrap_or_else(|| vec![0.0; n]);
        for ((slot, &prev), &new) in updated.iter_mut().zip(&self.bars).zip(target) {
            let new = if new.is_finite() { new } else { 0.0 };
            let smoothed = (1.0 - self.alpha) * prev + self.alpha * new;
            *slot = prev + limit(smoothed - prev, self.max_change);
        }
        self.spare = self.history.push(updated);

        self.averaged.fill(0.0);
        for row in self.history.iter() {
            for (acc, &v) in self.averaged.iter_mut().zip(row) {
                *acc += v;
            }
        }
        let depth = self.history.len().max(1) as f32;
        for v in self.averaged.iter_mut() {
            *v /= depth;
        }

        let peak = self.averaged.iter().copied().fold(0.0_f32, f32::max);
        self.peaks.push(peak + PEAK_EPSILON);
        let scale = dsp::percentile(
            self.peaks.iter().copied(),
            PEAK_PERCENTILE,
            &mut self.percentile_scratch,
        );

        for (bar, &avg) in self.bars.iter_mut().zip(&self.averaged) {
            let mut value = if scale > ADAPTIVE_GAIN_THRESHOLD {
                avg / scale
            } else {
                avg
            };
            if value < self.noise_floor {
                value = 0.0;
            }
            let value = value.clamp(0.0, 1.0);

            // Averaging and gain can still jump; keep committed changes bounded
            *bar += limit(value - *bar, self.max_change);
        }
    }
}

fn limit(delta: f32, max_change: f32) -> f32 {
    delta.clamp(-max_change, max_change)
}
