//! Audio decoding with Symphonia
//!
//! Everything that comes out of the loader matches the engine: same sample
//! rate (rubato FFT resampler) and same channel count (mono duplicated,
//! extra channels dropped).

use std::io::Cursor;
use std::path::Path;

use groove_audio::{AudioBuffer, AudioDecoder, DecodeError, EngineContext};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use tracing::debug;

const RESAMPLE_CHUNK: usize = 1024;

/// Tags read from the container
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Duration before resampling
    pub duration_secs: f64,
    pub source_sample_rate: u32,
    pub source_channels: u16,
}

/// A decoded file plus its tags
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub buffer: AudioBuffer,
    pub metadata: TrackMetadata,
}

/// Decoder producing buffers at a fixed rate and channel count
#[derive(Debug, Clone, Copy)]
pub struct TrackLoader {
    target_sample_rate: u32,
    target_channels: u16,
}

impl TrackLoader {
    pub fn new(context: EngineContext) -> Self {
        Self::with_format(context.sample_rate, context.channels)
    }

    pub fn with_format(target_sample_rate: u32, target_channels: u16) -> Self {
        Self {
            target_sample_rate: target_sample_rate.max(1),
            target_channels: target_channels.max(1),
        }
    }

    /// Decode a file from disk
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, DecodeError> {
        let file = std::fs::File::open(path)?;
        let hint = path.extension().and_then(|e| e.to_str());
        self.decode_source(Box::new(file), hint)
    }

    /// Decode an in-memory file
    pub fn load_bytes(&self, bytes: &[u8], hint: Option<&str>) -> Result<LoadedTrack, DecodeError> {
        self.decode_source(Box::new(Cursor::new(bytes.to_vec())), hint)
    }

    fn decode_source(&self, source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<LoadedTrack, DecodeError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let mut metadata = read_tags(format.as_mut());
        let mut source_rate = codec_params.sample_rate.unwrap_or(0);
        let mut source_channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

        let mut samples: Vec<f32> = Vec::new();
        let mut skipped = 0usize;
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
            };

            let spec = *decoded.spec();
            source_rate = spec.rate;
            source_channels = spec.channels.count() as u16;

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if samples.is_empty() || source_rate == 0 || source_channels == 0 {
            return Err(DecodeError::Empty);
        }
        if skipped > 0 {
            debug!(skipped, "skipped undecodable packets");
        }

        let frames = samples.len() / source_channels as usize;
        metadata.duration_secs = frames as f64 / source_rate as f64;
        metadata.source_sample_rate = source_rate;
        metadata.source_channels = source_channels;

        let samples = conform_channels(samples, source_channels, self.target_channels);
        let samples = if source_rate != self.target_sample_rate {
            resample(&samples, source_rate, self.target_sample_rate, self.target_channels)?
        } else {
            samples
        };

        let buffer = AudioBuffer::new(samples, self.target_channels, self.target_sample_rate);
        debug!(
            source_rate,
            source_channels,
            frames = buffer.frames(),
            "decoded audio"
        );
        Ok(LoadedTrack { buffer, metadata })
    }
}

impl AudioDecoder for TrackLoader {
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<AudioBuffer, DecodeError> {
        self.load_bytes(bytes, hint).map(|track| track.buffer)
    }
}

fn read_tags(format: &mut dyn FormatReader) -> TrackMetadata {
    let mut metadata = TrackMetadata::default();
    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => metadata.title = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => metadata.artist = Some(tag.value.to_string()),
                Some(StandardTagKey::Album) => metadata.album = Some(tag.value.to_string()),
                _ => {}
            }
        }
    }
    metadata
}

/// Map interleaved audio from `from` channels to `to` channels
pub fn conform_channels(samples: Vec<f32>, from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples;
    }
    let from = from as usize;
    let to = to as usize;
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            out.push(frame[ch.min(from - 1)]);
        }
    }
    out
}

/// Resample interleaved audio with an FFT resampler
fn resample(samples: &[f32], source_rate: u32, target_rate: u32, channels: u16) -> Result<Vec<f32>, DecodeError> {
    use rubato::{FftFixedInOut, Resampler};

    let channels = channels as usize;
    let frames = samples.len() / channels;
    let resample_err = |e: &dyn std::fmt::Display| DecodeError::Resample(e.to_string());

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, RESAMPLE_CHUNK, channels)
            .map_err(|e| resample_err(&e))?;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect();

    let chunk = resampler.input_frames_next();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let mut pos = 0;
    while pos < frames {
        let end = (pos + chunk).min(frames);
        let input: Vec<Vec<f32>> = planar
            .iter()
            .map(|ch| {
                let mut block = ch[pos..end].to_vec();
                block.resize(chunk, 0.0);
                block
            })
            .collect();

        let resampled = resampler.process(&input, None).map_err(|e| resample_err(&e))?;

        // A zero-padded final chunk only contributes its share of output
        let keep = if end - pos == chunk {
            usize::MAX
        } else {
            (end - pos) * target_rate as usize / source_rate as usize
        };
        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data.into_iter().take(keep));
        }
        pos = end;
    }

    let out_frames = output.first().map_or(0, Vec::len);
    let mut interleaved = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        for channel in &output {
            interleaved.push(channel[frame]);
        }
    }
    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groove_audio::encode_pcm16;

    fn wav(samples: Vec<f32>, channels: u16, rate: u32) -> Vec<u8> {
        encode_pcm16(&AudioBuffer::new(samples, channels, rate)).unwrap()
    }

    #[test]
    fn test_conform_channels() {
        assert_eq!(conform_channels(vec![0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(conform_channels(vec![0.1, 0.2, 0.3, 0.4], 2, 1), vec![0.1, 0.3]);
        assert_eq!(conform_channels(vec![1.0, 2.0, 3.0], 3, 2), vec![1.0, 2.0]);
        assert_eq!(conform_channels(vec![0.5, 0.6], 2, 2), vec![0.5, 0.6]);
    }

    #[test]
    fn test_decode_wav_same_format() {
        let samples: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.01).sin() * 0.8).collect();
        let loader = TrackLoader::with_format(44100, 2);
        let buffer = loader.decode(&wav(samples.clone(), 2, 44100), Some("wav")).unwrap();

        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 1000);
        for (a, b) in samples.iter().zip(buffer.samples()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mono_file_is_duplicated() {
        let loader = TrackLoader::new(EngineContext::new(8000, 2));
        let track = loader.load_bytes(&wav(vec![0.25; 300], 1, 8000), Some("wav")).unwrap();
        assert_eq!(track.metadata.source_channels, 1);
        assert_eq!(track.buffer.frames(), 300);
        assert!(track.buffer.samples().chunks(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn test_resample_to_engine_rate() {
        let loader = TrackLoader::with_format(44100, 1);
        let track = loader.load_bytes(&wav(vec![0.0; 22050], 1, 22050), Some("wav")).unwrap();
        assert_eq!(track.metadata.source_sample_rate, 22050);
        assert_eq!(track.buffer.sample_rate(), 44100);
        let frames = track.buffer.frames() as i64;
        assert!((frames - 44100).abs() <= 64, "{frames}");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let loader = TrackLoader::with_format(44100, 2);
        assert!(loader.decode(b"definitely not audio", None).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        std::fs::write(&path, wav(vec![0.1; 512], 2, 48000)).unwrap();

        let track = TrackLoader::with_format(48000, 2).load(&path).unwrap();
        assert_eq!(track.buffer.frames(), 256);
        assert!((track.metadata.duration_secs - 256.0 / 48000.0).abs() < 1e-9);
    }
}
