use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use tracing::{debug, warn};

use super::analyzer::{Analysis, SpectralAnalyzer, SpectralFrame};
use super::dsp;
use super::settings::ProcessorSettings;

/// Linear-frequency analyzer: one Hann-windowed FFT per block, cropped to
/// the analysis range and resampled onto the working resolution.
pub struct FftAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    /// Bin range inside [fmin, fmax], end exclusive
    crop: (usize, usize),
    crop_frequencies: Vec<f32>,
    crop_magnitudes: Vec<f32>,
    /// Frequencies of the resampled working bins
    target_frequencies: Vec<f32>,
}

impl FftAnalyzer {
    pub fn new(settings: &ProcessorSettings) -> Self {
        let fft_size = settings.blocksize.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        // Only positive frequencies, DC through Nyquist
        let raw_fft_size = fft_size / 2 + 1;
        let bin_hz = settings.samplerate as f32 / fft_size as f32;

        let start = ((settings.fmin / bin_hz).ceil() as usize).min(raw_fft_size);
        let end = ((settings.fmax_safe / bin_hz).floor() as usize + 1).min(raw_fft_size);
        let end = end.max(start);
        let crop_frequencies: Vec<f32> = (start..end).map(|i| i as f32 * bin_hz).collect();

        let target_frequencies = if crop_frequencies.len() >= 2 {
            let lo = crop_frequencies[0];
            let hi = crop_frequencies[crop_frequencies.len() - 1];
            let n = settings.working_bins().max(2);
            (0..n)
                .map(|i| lo + (hi - lo) * i as f32 / (n - 1) as f32)
                .collect()
        } else {
            warn!(
                "FFT of {} samples resolves only {} bins in {}-{} Hz, output will be silent",
                fft_size,
                crop_frequencies.len(),
                settings.fmin,
                settings.fmax_safe
            );
            Vec::new()
        };

        debug!(
            "FFT analyzer: size {}, {} raw bins, crop {}..{}, {} working bins",
            fft_size,
            raw_fft_size,
            start,
            end,
            target_frequencies.len()
        );

        Self {
            fft_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            window: dsp::hann_window(fft_size),
            crop: (start, end),
            crop_magnitudes: vec![0.0; crop_frequencies.len()],
            crop_frequencies,
            target_frequencies,
        }
    }
}

impl SpectralAnalyzer for FftAnalyzer {
    fn window_len(&self) -> usize {
        self.fft_size
    }

    fn analyze(&mut self, samples: &[f32]) -> Analysis {
        if self.target_frequencies.is_empty() {
            return Analysis::Degenerate;
        }

        // Fill buffer with windowed samples
        for (i, sample) in samples.iter().take(self.fft_size).enumerate() {
            self.buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }

        // Zero-pad if needed
        for i in samples.len().min(self.fft_size)..self.fft_size {
            self.buffer[i] = Complex::new(0.0, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let (start, end) = self.crop;
        for (slot, bin) in self.crop_magnitudes.iter_mut().zip(&self.buffer[start..end]) {
            *slot = bin.norm().ln_1p();
        }

        let mut magnitudes: Vec<f32> = self
            .target_frequencies
            .iter()
            .map(|&f| dsp::interp(f, &self.crop_frequencies, &self.crop_magnitudes))
            .collect();
        dsp::min_max_normalize(&mut magnitudes);

        Analysis::Frame(SpectralFrame {
            magnitudes,
            frequencies: self.target_frequencies.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "fft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    fn settings(config: AudioConfig) -> ProcessorSettings {
        ProcessorSettings::from_config(&config).unwrap()
    }

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn frame_spans_working_resolution_and_range() {
        let settings = settings(AudioConfig {
            bar_count: 32,
            cqt_bins_per_bar: 2,
            ..AudioConfig::default()
        });
        let mut analyzer = FftAnalyzer::new(&settings);
        let frame = match analyzer.analyze(&sine(440.0, 44100.0, 1024)) {
            Analysis::Frame(frame) => frame,
            Analysis::Degenerate => panic!("tone should produce a frame"),
        };

        assert_eq!(frame.len(), 64);
        assert!(frame.frequencies[0] >= settings.fmin);
        assert!(*frame.frequencies.last().unwrap() <= settings.fmax_safe);
        assert!(frame.magnitudes.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn tone_peaks_near_its_frequency() {
        let settings = settings(AudioConfig {
            bar_count: 64,
            cqt_bins_per_bar: 4,
            blocksize: 2048,
            ..AudioConfig::default()
        });
        let mut analyzer = FftAnalyzer::new(&settings);
        let frame = analyzer
            .analyze(&sine(1000.0, 44100.0, 2048))
            .frame()
            .cloned()
            .unwrap();

        let (peak, _) = frame
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        let peak_hz = frame.frequencies[peak];
        assert!(
            (peak_hz - 1000.0).abs() < 50.0,
            "expected peak near 1000 Hz, got {peak_hz}"
        );
    }

    #[test]
    fn silence_yields_flat_zero_frame() {
        let settings = settings(AudioConfig::default());
        let mut analyzer = FftAnalyzer::new(&settings);
        let frame = analyzer.analyze(&vec![0.0; 1024]).frame().cloned().unwrap();
        assert!(frame.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn short_window_is_zero_padded() {
        let settings = settings(AudioConfig::default());
        let mut analyzer = FftAnalyzer::new(&settings);
        let analysis = analyzer.analyze(&sine(440.0, 44100.0, 100));
        assert!(!analysis.is_degenerate());
    }

    #[test]
    fn range_narrower_than_resolution_is_degenerate() {
        // 64-sample FFT at 44.1 kHz has ~689 Hz bins
        let settings = settings(AudioConfig {
            blocksize: 64,
            fmin: 100.0,
            fmax: 300.0,
            ..AudioConfig::default()
        });
        let mut analyzer = FftAnalyzer::new(&settings);
        assert!(analyzer.analyze(&vec![0.1; 64]).is_degenerate());
    }
}
