use tracing::debug;

use super::analyzer::AnalyzerKind;
use crate::config::{AudioConfig, Backend, VisualizationMode};
use crate::error::ConfigError;

/// Distance kept between `fmax` and Nyquist, in Hz.
const NYQUIST_MARGIN: f32 = 100.0;

/// Validated, clamped processor parameters.
///
/// Built once from an [`AudioConfig`]; every component sizes itself from
/// these values and they never change for the processor's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    pub bar_count: usize,
    pub samplerate: u32,
    pub blocksize: usize,
    pub buffer_capacity: usize,
    pub exp_smooth_factor: f32,
    pub max_change_speed: f32,
    pub noise_floor: f32,
    pub peak_sharpness: f32,
    pub avg_window_size: usize,
    pub visualization_mode: VisualizationMode,
    pub fmin: f32,
    /// Configured upper bound
    pub fmax: f32,
    /// Upper bound clamped below Nyquist, used by the transforms
    pub fmax_safe: f32,
    pub cqt_bins_per_bar: usize,
    pub bins_per_octave: usize,
    pub accent_threshold: f32,
    pub accent_boost: f32,
    pub backend: Backend,
    pub analyzer: AnalyzerKind,
}

impl ProcessorSettings {
    pub fn from_config(config: &AudioConfig) -> Result<Self, ConfigError> {
        if config.bar_count == 0 {
            return Err(ConfigError::ZeroBars);
        }
        if config.samplerate == 0 {
            return Err(ConfigError::NonPositive { name: "samplerate" });
        }
        if config.blocksize == 0 {
            return Err(ConfigError::NonPositive { name: "blocksize" });
        }

        let floats = [
            ("exp_smooth_factor", config.exp_smooth_factor),
            ("max_change_speed", config.max_change_speed),
            ("noise_floor", config.noise_floor),
            ("peak_sharpness", config.peak_sharpness),
            ("fmin", config.fmin),
            ("fmax", config.fmax),
            ("accent_threshold", config.accent_threshold),
            ("accent_boost", config.accent_boost),
        ];
        if let Some((name, _)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NotFinite { name: *name });
        }

        if config.fmin <= 0.0 {
            return Err(ConfigError::NonPositive { name: "fmin" });
        }
        if config.fmax <= config.fmin {
            return Err(ConfigError::InvalidFrequencyRange {
                fmin: config.fmin,
                fmax: config.fmax,
            });
        }
        let fmax_safe = config
            .fmax
            .min(config.samplerate as f32 / 2.0 - NYQUIST_MARGIN);
        if fmax_safe <= config.fmin {
            return Err(ConfigError::RangeAboveNyquist {
                fmin: config.fmin,
                samplerate: config.samplerate,
            });
        }

        let buffer_blocks = config.buffer_blocks.max(1);
        let settings = Self {
            bar_count: config.bar_count,
            samplerate: config.samplerate,
            blocksize: config.blocksize,
            buffer_capacity: config.blocksize * buffer_blocks,
            exp_smooth_factor: config.exp_smooth_factor.clamp(0.0, 1.0),
            max_change_speed: config.max_change_speed.clamp(0.0, 2.0),
            noise_floor: config.noise_floor.max(0.0),
            peak_sharpness: config.peak_sharpness.max(0.0),
            avg_window_size: config.avg_window_size.max(1),
            visualization_mode: config.visualization_mode,
            fmin: config.fmin,
            fmax: config.fmax,
            fmax_safe,
            cqt_bins_per_bar: config.cqt_bins_per_bar.max(1),
            bins_per_octave: config.bins_per_octave.max(1),
            accent_threshold: config.accent_threshold,
            accent_boost: config.accent_boost,
            backend: config.backend,
            analyzer: config.analyzer,
        };

        debug!(
            "Processor settings: {} bars, {} Hz, window {} samples, range {}-{} Hz, {:?} analyzer",
            settings.bar_count,
            settings.samplerate,
            settings.buffer_capacity,
            settings.fmin,
            settings.fmax_safe,
            settings.analyzer
        );

        Ok(settings)
    }

    /// Resolution both analyzers resample their spectrum to.
    pub fn working_bins(&self) -> usize {
        self.bar_count * self.cqt_bins_per_bar
    }

    /// Number of constant-Q bins: enough for the bar resolution and never
    /// coarser than `bins_per_octave` across the configured range.
    pub fn cqt_bins(&self) -> usize {
        let octaves = (self.fmax / self.fmin).log2().ceil().max(1.0) as usize;
        self.working_bins().max(self.bins_per_octave * octaves)
    }
}
