//! sa-tone - play a sine tone through the configured audio backend
//!
//! Usage: `sa-tone [frequency-hz] [seconds]`

use std::f32::consts::TAU;

use anyhow::{Context, Result};
use sa_audio::{create_backend, AudioBackend};
use sa_core::config::Config;
use sa_core::SampleFormat;

/// Frames per write; kept short on purpose so playback relies on the
/// backend's buffer queue
const CHUNK_FRAMES: usize = 256;

fn parse_args() -> Result<(f32, f32)> {
    let mut args = std::env::args().skip(1);
    let frequency = match args.next() {
        Some(arg) => arg.parse().context("frequency must be a number")?,
        None => 440.0,
    };
    let seconds = match args.next() {
        Some(arg) => arg.parse().context("duration must be a number")?,
        None => 2.0,
    };
    Ok((frequency, seconds))
}

fn main() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    sa_core::logging::init(&config);

    let (frequency, seconds) = parse_args()?;
    let mut params = config.audio.stream_params("sa-tone", "tone");
    if params.format != SampleFormat::S16 {
        tracing::warn!("sa-tone only generates s16 samples, ignoring {}", params.format);
        params.format = SampleFormat::S16;
    }

    let mut backend = create_backend(&config.audio);
    backend
        .open(&params)
        .with_context(|| format!("cannot open {} backend", backend.name()))?;

    let channels = params.channels as usize;
    let total_frames = (seconds * params.rate as f32) as usize;
    let step = TAU * frequency / params.rate as f32;
    tracing::info!(
        "Playing {} Hz for {} s ({} frames at {} Hz)",
        frequency,
        seconds,
        total_frames,
        params.rate
    );

    let mut phase = 0.0f32;
    let mut samples = Vec::with_capacity(CHUNK_FRAMES * channels);
    let mut remaining = total_frames;
    while remaining > 0 {
        let frames = remaining.min(CHUNK_FRAMES);
        samples.clear();
        for _ in 0..frames {
            let value = (phase.sin() * 0.25 * f32::from(i16::MAX)) as i16;
            samples.extend(std::iter::repeat(value).take(channels));
            phase = (phase + step) % TAU;
        }
        backend
            .write(bytemuck::cast_slice::<i16, u8>(&samples), frames)
            .context("write failed")?;
        remaining -= frames;
    }

    backend.close().context("close failed")?;
    tracing::info!("Done");
    Ok(())
}
