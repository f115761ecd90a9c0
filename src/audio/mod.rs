mod accent;
mod analyzer;
mod bars;
#[cfg(feature = "pulse")]
mod capture;
mod cqt;
mod dsp;
mod fft;
mod processor;
mod ring;
mod settings;
mod smoothing;
mod stdin;

pub use accent::{Accent, AccentDetector};
pub use analyzer::{build_analyzer, Analysis, AnalyzerKind, SpectralAnalyzer, SpectralFrame};
pub use bars::BarMapper;
#[cfg(feature = "pulse")]
pub use capture::{list_sources, AudioCapture};
pub use cqt::CqtAnalyzer;
pub use fft::FftAnalyzer;
pub use processor::AudioProcessor;
pub use ring::{History, RingBuffer};
pub use settings::ProcessorSettings;
pub use smoothing::SmoothingEngine;
pub use stdin::StdinCapture;
