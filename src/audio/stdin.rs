use anyhow::{Context, Result};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::processor::AudioProcessor;

/// Feeds interleaved little-endian f32 samples from a byte stream into a
/// processor, one block at a time, on a dedicated thread.
pub struct StdinCapture {
    capture_thread: Option<thread::JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl Drop for StdinCapture {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

impl StdinCapture {
    /// Read from the process's standard input.
    pub fn new(processor: Arc<AudioProcessor>, channels: usize) -> Result<Self> {
        info!("Reading f32le audio from stdin, {} channel(s)", channels.max(1));
        Self::from_reader(io::stdin(), processor, channels)
    }

    pub fn from_reader<R>(reader: R, processor: Arc<AudioProcessor>, channels: usize) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();
        let finished_clone = finished.clone();

        let capture_thread = thread::Builder::new()
            .name("spectrobars-stdin".to_string())
            .spawn(move || {
                Self::capture_loop(reader, &processor, channels.max(1), &stop_flag_clone);
                finished_clone.store(true, Ordering::Relaxed);
            })
            .context("Failed to spawn capture thread")?;

        Ok(Self {
            capture_thread: Some(capture_thread),
            stop_flag,
            finished,
        })
    }

    /// True once the stream has ended or failed.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Block until the stream is exhausted.
    pub fn wait(mut self) {
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }

    fn capture_loop<R: Read>(
        mut reader: R,
        processor: &AudioProcessor,
        channels: usize,
        stop_flag: &AtomicBool,
    ) {
        let block_len = processor.settings().blocksize * channels;
        let mut bytes = vec![0u8; block_len * 4];
        let mut samples = Vec::with_capacity(block_len);

        loop {
            if stop_flag.load(Ordering::Relaxed) {
                debug!("Stop flag set, ending capture loop");
                break;
            }

            let filled = match read_block(&mut reader, &mut bytes) {
                Ok(0) => {
                    info!("Input stream ended");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Input read error: {}", e);
                    break;
                }
            };

            decode_f32le(&bytes[..filled], &mut samples);
            processor.ingest(&samples, samples.len() / channels, channels);

            if filled < bytes.len() {
                info!("Input stream ended");
                break;
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read.
/// Short counts only happen at end of stream.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decode little-endian f32 samples, dropping a trailing partial sample.
pub(crate) fn decode_f32le(bytes: &[u8], out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use std::io::Cursor;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_little_endian_floats() {
        let mut bytes = encode(&[0.5, -1.0, 0.25]);
        bytes.push(0xff);
        let mut out = Vec::new();
        decode_f32le(&bytes, &mut out);
        assert_eq!(out, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn reader_feeds_processor_until_eof() {
        let processor = Arc::new(
            AudioProcessor::new(&AudioConfig {
                bar_count: 8,
                blocksize: 256,
                analyzer: crate::audio::AnalyzerKind::Fft,
                ..AudioConfig::default()
            })
            .unwrap(),
        );

        // Two and a half stereo blocks of a 440 Hz tone
        let samples: Vec<f32> = (0..640)
            .flat_map(|i| {
                let s = 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin();
                [s, s]
            })
            .collect();

        let capture =
            StdinCapture::from_reader(Cursor::new(encode(&samples)), processor.clone(), 2).unwrap();
        capture.wait();

        let bars = processor.snapshot();
        assert_eq!(bars.len(), 8);
        assert!(bars.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn empty_stream_finishes() {
        let processor = Arc::new(AudioProcessor::new(&AudioConfig {
            bar_count: 4,
            analyzer: crate::audio::AnalyzerKind::Fft,
            ..AudioConfig::default()
        })
        .unwrap());
        let capture = StdinCapture::from_reader(Cursor::new(Vec::new()), processor.clone(), 1).unwrap();
        capture.wait();
        assert_eq!(processor.snapshot(), vec![0.0; 4]);
    }
}
