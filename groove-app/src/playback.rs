//! Live playback through cpal
//!
//! The engine context follows the output device. The path is moved into the
//! callback and renders f32, converted per sample for i16/u16 devices; the
//! main thread keeps the engine and polls it until the track ends.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{error, info};

use groove_audio::{EngineContext, SignalPath};
use groove_library::Config;

use crate::{build_engine, configure, load_input, ChainArgs};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(config: &Config, input: &Path, chain: &ChainArgs) -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no audio output device found"))?;
    let device_config = device
        .default_output_config()
        .context("querying output config")?;

    let context = EngineContext::new(device_config.sample_rate().0, device_config.channels());
    let sample_format = device_config.sample_format();
    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate = context.sample_rate,
        channels = context.channels,
        format = ?sample_format,
        "output device"
    );

    let (mut engine, path) = build_engine(config, context, chain);
    load_input(&mut engine, input)?;
    configure(&mut engine, config, chain)?;

    let stream_config: StreamConfig = device_config.into();
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, path),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, path),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, path),
        other => bail!("unsupported sample format {:?}", other),
    }
    .context("creating output stream")?;
    stream.play().context("starting output stream")?;

    engine.play()?;
    while !engine.poll() {
        thread::sleep(POLL_INTERVAL);
    }

    engine.destroy();
    drop(stream);
    Ok(())
}

fn build_stream<T>(device: &cpal::Device, config: &StreamConfig, mut path: SignalPath) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() != data.len() {
                scratch.resize(data.len(), 0.0);
            }
            path.process(&mut scratch);
            convert_into(data, &scratch);
        },
        |err| error!("audio stream error: {}", err),
        None,
    )
}

/// Write rendered f32 samples into a device buffer of any sample type
fn convert_into<T>(out: &mut [T], rendered: &[f32])
where
    T: Sample + FromSample<f32>,
{
    for (o, &s) in out.iter_mut().zip(rendered) {
        *o = <T as Sample>::from_sample(s);
    }
}
