use tracing::trace;

use super::dsp;
use super::ring::History;

/// Depth of the rolling energy history
pub const ENERGY_HISTORY: usize = 20;

/// Minimum ingest cycles between two accents
pub const ACCENT_COOLDOWN: usize = 5;

/// Upper bound on how far above threshold an accent can count
const MAX_STRENGTH: f32 = 3.0;

/// A detected transient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accent {
    /// Energy ratio over the threshold, capped at 3
    pub strength: f32,
    /// Gain applied to the bar array this cycle
    pub multiplier: f32,
}

/// Flags short loudness spikes relative to recent average energy.
///
/// Sustained loudness raises the average along with the signal, so only
/// transients (kicks, snares) cross the threshold.
#[derive(Debug, Clone)]
pub struct AccentDetector {
    energy: History<f32>,
    threshold: f32,
    boost: f32,
    cooldown: usize,
    cycles_since_accent: usize,
}

impl AccentDetector {
    pub fn new(threshold: f32, boost: f32) -> Self {
        Self {
            energy: History::new(ENERGY_HISTORY),
            threshold,
            boost,
            cooldown: ACCENT_COOLDOWN,
            // Start ready to fire
            cycles_since_accent: ACCENT_COOLDOWN,
        }
    }

    /// Feed one raw mono frame and return the multiplier for this cycle.
    pub fn process(&mut self, frame: &[f32]) -> f32 {
        self.observe(dsp::rms(frame))
            .map(|accent| accent.multiplier)
            .unwrap_or(1.0)
    }

    /// Feed one frame's RMS energy.
    pub fn observe(&mut self, energy: f32) -> Option<Accent> {
        self.energy.push(energy);
        self.cycles_since_accent = self.cycles_since_accent.saturating_add(1);

        let mean = self.energy.mean();
        let is_spike = mean > 0.0 && energy > mean * self.threshold;
        if !is_spike || self.cycles_since_accent < self.cooldown {
            return None;
        }

        self.cycles_since_accent = 0;
        let strength = (energy / mean / self.threshold).min(MAX_STRENGTH);
        let accent = Accent {
            strength,
            multiplier: 1.0 + (self.boost - 1.0) * strength,
        };
        trace!(
            "Accent: energy {:.4} vs mean {:.4}, multiplier {:.2}",
            energy,
            mean,
            accent.multiplier
        );
        Some(accent)
    }
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
    fn steady_energy_never_fires() {
        let mut detector = AccentDetector::new(1.8, 2.0);
        for _ in 0..50 {
            assert!(detector.observe(0.3).is_none());
        }
    }

    #[test]
    fn silence_never_fires() {
        let mut detector = AccentDetector::new(1.8, 2.0);
        for _ in 0..30 {
            assert_eq!(detector.process(&[0.0; 256]), 1.0);
        }
    }

    #[test]
    fn persistent_spike_respects_cooldown() {
        let mut detector = AccentDetector::new(1.8, 2.0);
        let mut fired = Vec::new();

        for cycle in 0..20 {
            let energy = if cycle < 10 { 0.1 } else { 0.6 };
            if detector.observe(energy).is_some() {
                fired.push(cycle);
            }
        }

        // Spike at 10 fires; persisting spike is blocked until the cooldown ends
        assert_eq!(fired.first(), Some(&10));
        assert!(fired.iter().all(|&c| c == 10 || c >= 15));
        assert_eq!(fired.get(1), Some(&15));
    }

    #[test]
    fn multiplier_scales_with_strength() {
        let mut detector = AccentDetector::new(2.0, 3.0);
        for _ in 0..10 {
            detector.observe(0.1);
        }
        let accent = detector.observe(0.6).unwrap();

        // mean = 1.6 / 11, ratio = 0.6 / mean / 2
        let mean = 1.6 / 11.0;
        let strength = 0.6 / mean / 2.0;
        assert_approx(accent.strength, strength, 1e-4);
        assert_approx(accent.multiplier, 1.0 + 2.0 * strength, 1e-4);
    }

    #[test]
    fn strength_is_capped() {
        let mut detector = AccentDetector::new(1.1, 2.0);
        for _ in 0..19 {
            detector.observe(0.001);
        }
        let accent = detector.observe(10.0).unwrap();
        assert_approx(accent.strength, 3.0, 1e-6);
        assert_approx(accent.multiplier, 4.0, 1e-6);
    }

    #[test]
    fn history_is_bounded() {
        let mut detector = AccentDetector::new(1.8, 2.0);
        for _ in 0..100 {
            detector.observe(0.2);
        }
        assert_eq!(detector.energy.len(), ENERGY_HISTORY);
    }
}
