//! Constant-Q analysis with log-spaced bins.
//!
//! Uses precomputed sparse spectral kernels: each tick runs a single FFT over
//! the most recent samples and takes one sparse dot product per bin, which
//! yields the newest time frame of a constant-Q transform. Kernels are aligned
//! to the end of the window so every bin sees the freshest audio.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::{debug, warn};

use super::analyzer::{Analysis, SpectralAnalyzer, SpectralFrame};
use super::dsp;
use super::settings::ProcessorSettings;
use crate::error::AnalysisError;

/// Spectral kernel entries below this fraction of the kernel peak are dropped
const KERNEL_SPARSITY: f32 = 0.01;

/// Power at or below this counts as no signal (magnitude 1e-8)
const DEGENERATE_POWER: f32 = 1e-16;

/// Resolution ceiling for very narrow ranges, one bin per cent
const MAX_BINS_PER_OCTAVE: f32 = 1200.0;

/// Kernel coefficients for one constant-Q bin.
struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
}

impl SparseKernel {
    fn apply(&self, spectrum: &[Complex<f32>]) -> Complex<f32> {
        self.entries
            .iter()
            .map(|&(j, coeff)| spectrum[j] * coeff)
            .sum()
    }
}

pub struct CqtAnalyzer {
    fft_len: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    kernels: Vec<SparseKernel>,
    frequencies: Vec<f32>,
    power: Vec<f32>,
    sample_rate: f32,
    warned: bool,
}

impl CqtAnalyzer {
    pub fn new(settings: &ProcessorSettings) -> Self {
        let n_bins = settings.cqt_bins();
        let sample_rate = settings.samplerate as f32;
        let span = (settings.fmax_safe / settings.fmin).log2();

        let frequencies: Vec<f32> = if n_bins > 1 {
            (0..n_bins)
                .map(|k| settings.fmin * 2f32.powf(span * k as f32 / (n_bins - 1) as f32))
                .collect()
        } else {
            vec![settings.fmin]
        };

        // Effective bins per octave never drops below the configured resolution
        let resolution = if n_bins > 1 {
            ((n_bins - 1) as f32 / span).max(settings.bins_per_octave as f32)
        } else {
            settings.bins_per_octave as f32
        };
        let resolution = resolution.min(MAX_BINS_PER_OCTAVE);
        let q = 1.0 / (2f32.powf(1.0 / resolution) - 1.0);

        let longest = (q * sample_rate / settings.fmin).ceil() as usize;
        let fft_len = longest
            .checked_next_power_of_two()
            .unwrap_or(usize::MAX)
            .min(settings.buffer_capacity)
            .max(2);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let mut temporal = vec![Complex::new(0.0, 0.0); fft_len];
        let kernels: Vec<SparseKernel> = frequencies
            .iter()
            .map(|&freq| {
                let len = ((q * sample_rate / freq).ceil() as usize).clamp(1, fft_len);
                Self::build_kernel(freq, len, sample_rate, &fft, &mut temporal, &mut scratch)
            })
            .collect();

        let entries: usize = kernels.iter().map(|k| k.entries.len()).sum();
        debug!(
            "CQT analyzer: {} bins over {:.0}-{:.0} Hz, Q {:.1}, window {} samples, {} kernel entries",
            n_bins,
            settings.fmin,
            settings.fmax_safe,
            q,
            fft_len,
            entries
        );

        Self {
            fft_len,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_len],
            scratch,
            kernels,
            power: vec![0.0; frequencies.len()],
            frequencies,
            sample_rate,
            warned: false,
        }
    }

    /// Hann-windowed complex exponential of `len` samples at `freq`, placed
    /// at the end of the frame, then moved to the frequency domain.
    fn build_kernel(
        freq: f32,
        len: usize,
        sample_rate: f32,
        fft: &Arc<dyn Fft<f32>>,
        temporal: &mut [Complex<f32>],
        scratch: &mut [Complex<f32>],
    ) -> SparseKernel {
        let fft_len = temporal.len();
        let offset = fft_len - len;
        let window = dsp::hann_window(len);

        temporal[..offset].fill(Complex::new(0.0, 0.0));
        for (m, slot) in temporal[offset..].iter_mut().enumerate() {
            let phase = 2.0 * PI * freq * m as f32 / sample_rate;
            *slot = Complex::from_polar(window[m] / len as f32, phase);
        }
        fft.process_with_scratch(temporal, scratch);

        let peak = temporal.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
        let threshold = peak * KERNEL_SPARSITY;

        // Parseval: sum(x * conj(t)) == sum(X * conj(T)) / N
        let entries = temporal
            .iter()
            .enumerate()
            .filter(|(_, c)| c.norm() >= threshold)
            .map(|(j, c)| (j, c.conj() / fft_len as f32))
            .collect();

        SparseKernel { entries }
    }

    /// Fill `self.power` with the newest constant-Q frame.
    fn transform(&mut self, window: &[f32]) -> Result<(), AnalysisError> {
        if window.len() != self.fft_len {
            return Err(AnalysisError::WindowLength {
                expected: self.fft_len,
                actual: window.len(),
            });
        }

        for (slot, &sample) in self.buffer.iter_mut().zip(window) {
            *slot = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (power, kernel) in self.power.iter_mut().zip(&self.kernels) {
            *power = kernel.apply(&self.buffer).norm_sqr();
        }

        if self.power.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::NonFinite);
        }
        Ok(())
    }

    /// Warn about the first unusable frame, then keep quiet at debug.
    fn report(&mut self, reason: &str, outcome: &str) {
        if self.warned {
            debug!("Constant-Q frame unusable ({}), {}", reason, outcome);
        } else {
            warn!("Constant-Q frame unusable ({}), {}", reason, outcome);
            self.warned = true;
        }
    }
}

impl SpectralAnalyzer for CqtAnalyzer {
    fn window_len(&self) -> usize {
        self.fft_len
    }

    fn analyze(&mut self, window: &[f32]) -> Analysis {
        let (mut power, frequencies) = match self.transform(window) {
            Ok(()) if self.power.iter().all(|&p| p <= DEGENERATE_POWER) => {
                self.report("no signal energy", "emitting a silent frame");
                return Analysis::Degenerate;
            }
            Ok(()) => (self.power.clone(), self.frequencies.clone()),
            Err(e) => {
                self.report(&e.to_string(), "using the short-time spectrum instead");
                match stft_power(window, self.sample_rate) {
                    Some(fallback) => fallback,
                    None => return Analysis::Degenerate,
                }
            }
        };

        dsp::power_to_db(&mut power);
        dsp::min_max_normalize(&mut power);

        Analysis::Frame(SpectralFrame {
            magnitudes: power,
            frequencies,
        })
    }

    fn name(&self) -> &'static str {
        "cqt"
    }
}

/// Short-time Fourier fallback: mean magnitude per bin across frames,
/// returned as power together with each bin's frequency.
fn stft_power(window: &[f32], sample_rate: f32) -> Option<(Vec<f32>, Vec<f32>)> {
    if window.is_empty() || window.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let n_fft = (window.len() / 2).clamp(32, 512);
    let hop = (n_fft / 4).max(16);
    let fft = FftPlanner::new().plan_fft_forward(n_fft);
    let hann = dsp::hann_window(n_fft);
    let n_out = n_fft / 2 + 1;

    let mut sums = vec![0.0f32; n_out];
    let mut frames = 0usize;
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
    let mut start = 0;
    loop {
        for (i, slot) in buffer.iter_mut().enumerate() {
            let sample = window.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * hann[i], 0.0);
        }
        fft.process(&mut buffer);
        for (sum, bin) in sums.iter_mut().zip(&buffer) {
            *sum += bin.norm();
        }
        frames += 1;

        start += hop;
        if start + n_fft > window.len() {
            break;
        }
    }

    let power: Vec<f32> = sums
        .iter()
        .map(|s| {
            let mean = s / frames as f32;
            mean * mean
        })
        .collect();
    if power.iter().all(|&p| p <= DEGENERATE_POWER) {
        return None;
    }

    let frequencies = (0..n_out)
        .map(|k| k as f32 * sample_rate / n_fft as f32)
        .collect();
    Some((power, frequencies))
}
