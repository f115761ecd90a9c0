use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use spectrobars::audio::{AudioProcessor, StdinCapture};
use spectrobars::cli::{Args, SourceKind};
use spectrobars::config::Config;
use spectrobars::monitor::Monitor;

/// Keeps whichever capture is running alive for the session.
enum Capture {
    Stdin(StdinCapture),
    #[cfg(feature = "pulse")]
    Pulse(spectrobars::audio::AudioCapture),
}

impl Capture {
    fn is_finished(&self) -> bool {
        match self {
            Capture::Stdin(capture) => capture.is_finished(),
            #[cfg(feature = "pulse")]
            Capture::Pulse(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with bar output
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spectrobars=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    if args.list_sources {
        return list_sources();
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);

    let processor = Arc::new(
        AudioProcessor::new(&config.audio).context("Invalid audio configuration")?,
    );
    info!(
        "Starting spectrobars: {} bars from {:?}",
        processor.bar_count(),
        args.source
    );

    let capture = start_capture(&args, &config, processor.clone())?;

    let mut monitor = Monitor::new(config.monitor.style, io::stdout());
    let mut ticker = tokio::time::interval(Duration::from_millis(config.monitor.poll_interval_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                monitor.draw(&processor.snapshot())?;
                if capture.is_finished() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    monitor.finish()?;
    Ok(())
}

#[cfg_attr(not(feature = "pulse"), allow(unused_variables))]
fn start_capture(args: &Args, config: &Config, processor: Arc<AudioProcessor>) -> Result<Capture> {
    match args.source {
        SourceKind::Stdin => Ok(Capture::Stdin(StdinCapture::new(processor, args.channels)?)),
        #[cfg(feature = "pulse")]
        SourceKind::Pulse => Ok(Capture::Pulse(spectrobars::audio::AudioCapture::new(
            processor,
            config.audio.device.clone(),
        )?)),
        #[cfg(not(feature = "pulse"))]
        SourceKind::Pulse => {
            anyhow::bail!("PulseAudio capture requires building with --features pulse")
        }
    }
}

#[cfg(feature = "pulse")]
fn list_sources() -> Result<()> {
    for (name, state) in spectrobars::audio::list_sources()? {
        println!("{}\t{}", name, state);
    }
    Ok(())
}

#[cfg(not(feature = "pulse"))]
fn list_sources() -> Result<()> {
    tracing::warn!("Built without PulseAudio support");
    anyhow::bail!("Listing sources requires building with --features pulse")
}
