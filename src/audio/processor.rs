use parking_lot::Mutex;
use tracing::{debug, info};

use super::accent::AccentDetector;
use super::analyzer::{build_analyzer, Analysis, SpectralAnalyzer};
use super::bars::BarMapper;
use super::ring::RingBuffer;
use super::settings::ProcessorSettings;
use super::smoothing::SmoothingEngine;
use crate::config::AudioConfig;
use crate::error::ConfigError;

/// Everything the producer side touches per block
struct Frontend {
    ring: RingBuffer,
    analyzer: Box<dyn SpectralAnalyzer>,
    accent: AccentDetector,
    mapper: BarMapper,
    mono: Vec<f32>,
    window: Vec<f32>,
    target: Vec<f32>,
}

/// Turns blocks of interleaved audio into a smoothed bar array.
///
/// `ingest` is called by the capture side for every block and does all of
/// the work synchronously. `snapshot` can be called from any thread and only
/// waits for the final smoothing step of an in-flight ingest.
pub struct AudioProcessor {
    settings: ProcessorSettings,
    analyzer_name: &'static str,
    front: Mutex<Frontend>,
    output: Mutex<SmoothingEngine>,
}

impl AudioProcessor {
    pub fn new(config: &AudioConfig) -> Result<Self, ConfigError> {
        let settings = ProcessorSettings::from_config(config)?;
        let analyzer = build_analyzer(&settings);
        let analyzer_name = analyzer.name();
        let window_len = analyzer.window_len();

        info!(
            "Audio processor ready: {} bars, {} analyzer, {:?} layout, {:?} backend",
            settings.bar_count, analyzer_name, settings.visualization_mode, settings.backend
        );

        let front = Frontend {
            ring: RingBuffer::new(settings.buffer_capacity),
            accent: AccentDetector::new(settings.accent_threshold, settings.accent_boost),
            mapper: BarMapper::new(&settings),
            mono: Vec::with_capacity(settings.blocksize),
            window: vec![0.0; window_len],
            target: vec![0.0; settings.bar_count],
            analyzer,
        };

        Ok(Self {
            output: Mutex::new(SmoothingEngine::new(&settings)),
            front: Mutex::new(front),
            analyzer_name,
            settings,
        })
    }

    pub fn bar_count(&self) -> usize {
        self.settings.bar_count
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer_name
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Feed one block of interleaved samples.
    ///
    /// Channels are averaged to mono, non-finite samples are replaced with
    /// silence and `frame_count` is clamped to what `samples` holds. An
    /// empty block still advances smoothing toward silence.
    pub fn ingest(&self, samples: &[f32], frame_count: usize, channel_count: usize) {
        let mut guard = self.front.lock();
        let front = &mut *guard;

        downmix(samples, frame_count, channel_count, &mut front.mono);

        let (analysis, accent) = if front.mono.is_empty() {
            debug!("Empty block, stepping toward silence");
            (Analysis::Degenerate, 1.0)
        } else {
            front.ring.append(&front.mono);
            front.ring.window_into(&mut front.window);
            let analysis = front.analyzer.analyze(&front.window);
            (analysis, front.accent.process(&front.mono))
        };

        front.mapper.map(&analysis, accent, &mut front.target);
        self.output.lock().step(&front.target);
    }

    /// Copy of the current bar array, always `bar_count` values in [0, 1].
    pub fn snapshot(&self) -> Vec<f32> {
        self.output.lock().bars().to_vec()
    }
}

/// Average interleaved channels into `mono`, replacing non-finite samples
/// with zero.
fn downmix(samples: &[f32], frame_count: usize, channel_count: usize, mono: &mut Vec<f32>) {
    let channels = channel_count.max(1);
    let frames = frame_count.min(samples.len() / channels);

    mono.clear();
    mono.extend(samples[..frames * channels].chunks_exact(channels).map(|frame| {
        let sum: f32 = frame
            .iter()
            .map(|&s| if s.is_finite() { s } else { 0.0 })
            .sum();
        sum / channels as f32
    }));
}
