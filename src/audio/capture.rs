use anyhow::{anyhow, Context, Result};
use libpulse_binding as pulse;
use libpulse_simple_binding as psimple;
use pulse::sample::{Format, Spec};
use pulse::stream::Direction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::processor::AudioProcessor;
use super::stdin::decode_f32le;

/// Channels requested from PulseAudio; the processor downmixes them.
const CAPTURE_CHANNELS: u8 = 2;

pub struct AudioCapture {
    // Keep the thread handle to ensure it stays alive
    _capture_thread: thread::JoinHandle<()>,
    stop_flag: Arc<AtomicBool>,
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

/// Sources the server offers, as `(name, state)` pairs.
///
/// Monitor sources end in `.monitor`; pass the part before it as `--device`.
pub fn list_sources() -> Result<Vec<(String, String)>> {
    let output = std::process::Command::new("pactl")
        .args(["list", "short", "sources"])
        .output()
        .context("Failed to run pactl")?;

    if !output.status.success() {
        return Err(anyhow!("pactl exited with {}", output.status));
    }

    Ok(parse_sources(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `pactl list short sources`; columns are id, name, driver, sample
/// spec and state. Short lines are skipped.
fn parse_sources(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            match cols.as_slice() {
                [_, name, _, _, state, ..] => Some((name.to_string(), state.to_string())),
                _ => None,
            }
        })
        .collect()
}

impl AudioCapture {
    /// Record the monitor of `device` (a sink name), or of the default sink.
    pub fn new(processor: Arc<AudioProcessor>, device: Option<String>) -> Result<Self> {
        let source = if let Some(sink_name) = device {
            let monitor = format!("{}.monitor", sink_name);
            info!("Using explicit sink monitor: {}", monitor);
            Some(monitor)
        } else {
            Self::find_monitor_source()
        };

        Self::start_capture(processor, source)
    }

    fn start_capture(processor: Arc<AudioProcessor>, device: Option<String>) -> Result<Self> {
        let spec = Spec {
            format: Format::F32le,
            channels: CAPTURE_CHANNELS,
            rate: processor.settings().samplerate,
        };

        if !spec.is_valid() {
            return Err(anyhow!("Invalid PulseAudio sample spec"));
        }

        let pulse = psimple::Simple::new(
            None,                // Use default server
            "spectrobars",       // Application name
            Direction::Record,   // Recording stream
            device.as_deref(),   // Device name (None = default)
            "spectrum-analyzer", // Stream description
            &spec,               // Sample format
            None,                // Default channel map
            None,                // Default buffering attributes
        )
        .map_err(|e| anyhow!("Failed to connect to PulseAudio: {:?}", e))?;

        info!(
            "Connected to PulseAudio at {} Hz, device {}",
            spec.rate,
            device.as_deref().unwrap_or("default")
        );

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let capture_thread = thread::spawn(move || {
            Self::capture_loop(pulse, &processor, &stop_flag_clone);
        });

        Ok(Self {
            _capture_thread: capture_thread,
            stop_flag,
        })
    }

    fn capture_loop(pulse: psimple::Simple, processor: &AudioProcessor, stop_flag: &AtomicBool) {
        let channels = CAPTURE_CHANNELS as usize;
        let frames = processor.settings().blocksize;
        let mut bytes = vec![0u8; frames * channels * 4];
        let mut samples = Vec::with_capacity(frames * channels);

        loop {
            if stop_flag.load(Ordering::Relaxed) {
                debug!("Stop flag set, ending capture loop");
                break;
            }

            if let Err(e) = pulse.read(&mut bytes) {
                warn!("PulseAudio read error: {:?}", e);
                continue;
            }

            decode_f32le(&bytes, &mut samples);
            processor.ingest(&samples, frames, channels);
        }
    }

    /// Monitor of the server's default sink, so bars follow whatever is
    /// playing. `None` lets PulseAudio pick its default source.
    fn find_monitor_source() -> Option<String> {
        let output = std::process::Command::new("pactl")
            .arg("get-default-sink")
            .output()
            .ok()
            .filter(|output| output.status.success())?;

        let sink = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sink.is_empty() {
            warn!("No default sink reported, recording the default source");
            return None;
        }

        let monitor = format!("{}.monitor", sink);
        info!("Recording default sink monitor {}", monitor);
        Some(monitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_source_listing() {
        let text = "0\talsa_output.pci.analog-stereo.monitor\tPipeWire\tfloat32le 2ch 48000Hz\tRUNNING\n\
                    1\talsa_input.pci.analog-stereo\tPipeWire\ts32le 2ch 48000Hz\tSUSPENDED\n\
                    garbage line\n";
        assert_eq!(
            parse_sources(text),
            vec![
                (
                    "alsa_output.pci.analog-stereo.monitor".to_string(),
                    "RUNNING".to_string()
                ),
                (
                    "alsa_input.pci.analog-stereo".to_string(),
                    "SUSPENDED".to_string()
                ),
            ]
        );
    }

    #[test]
    fn empty_listing_has_no_sources() {
        assert!(parse_sources("").is_empty());
    }
}
