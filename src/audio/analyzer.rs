use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::cqt::CqtAnalyzer;
use super::fft::FftAnalyzer;
use super::settings::ProcessorSettings;

/// Which spectral strategy a processor runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Fft,
    #[default]
    Cqt,
}

/// One analysis result: normalized magnitudes in ascending frequency order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    /// Magnitudes in [0, 1]
    pub magnitudes: Vec<f32>,
    /// Center frequency of each bin in Hz
    pub frequencies: Vec<f32>,
}

impl SpectralFrame {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Outcome of analyzing one window.
///
/// `Degenerate` stands in for a frame that could not be computed or carried
/// no energy; the bar mapper treats it as silence.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Frame(SpectralFrame),
    Degenerate,
}

impl Analysis {
    pub fn frame(&self) -> Option<&SpectralFrame> {
        match self {
            Analysis::Frame(frame) => Some(frame),
            Analysis::Degenerate => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Analysis::Degenerate)
    }
}

/// A spectral analysis strategy, chosen once when the processor is built.
pub trait SpectralAnalyzer: Send {
    /// Number of time-domain samples `analyze` expects.
    fn window_len(&self) -> usize;

    /// Analyze the most recent `window_len()` samples, oldest first.
    fn analyze(&mut self, window: &[f32]) -> Analysis;

    fn name(&self) -> &'static str;
}

/// Build the analyzer selected in `settings`.
pub fn build_analyzer(settings: &ProcessorSettings) -> Box<dyn SpectralAnalyzer> {
    match settings.analyzer {
        AnalyzerKind::Fft => Box::new(FftAnalyzer::new(settings)),
        AnalyzerKind::Cqt => Box::new(CqtAnalyzer::new(settings)),
    }
}
