//! Surface noise - cached crackle recordings and the looping player
//!
//! `NoiseBank` lives on the control side: it fetches, decodes and caches
//! noise buffers by file reference. `CrackleProcessor` lives on the audio
//! side and loops whichever buffer it was handed, at a rate that follows
//! 30% of the main transport's pitch change.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::buffer::AudioBuffer;
use crate::params::clamp_unit;
use crate::source::{extension_hint, AssetLoadError, AssetSource, AudioDecoder};
use crate::stage::EngineContext;

/// Share of the main pitch change applied to the noise loop
pub const PITCH_TRACKING: f64 = 0.3;

/// Loop rate for a given main playback rate
#[inline]
pub fn crackle_rate(pitch_ratio: f64) -> f64 {
    1.0 + (pitch_ratio - 1.0) * PITCH_TRACKING
}

/// Decoded noise buffers keyed by file reference
pub struct NoiseBank {
    assets: Arc<dyn AssetSource>,
    decoder: Arc<dyn AudioDecoder>,
    buffers: RwLock<HashMap<String, Arc<AudioBuffer>>>,
}

impl NoiseBank {
    pub fn new(assets: Arc<dyn AssetSource>, decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            assets,
            decoder,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch and decode `name` once; later calls return the cached buffer
    pub fn load(&self, name: &str) -> Result<Arc<AudioBuffer>, AssetLoadError> {
        if let Some(buffer) = self.get(name) {
            debug!(name, "noise buffer already cached");
            return Ok(buffer);
        }

        let bytes = self.assets.fetch(name)?;
        let hint = extension_hint(name);
        let buffer = self
            .decoder
            .decode(&bytes, hint.as_deref())
            .map_err(|source| AssetLoadError::Decode {
                name: name.to_string(),
                source,
            })?;

        info!(name, frames = buffer.frames(), "noise buffer loaded");
        let mut buffers = self.buffers.write();
        let entry = buffers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(buffer));
        Ok(Arc::clone(entry))
    }

    pub fn get(&self, name: &str) -> Option<Arc<AudioBuffer>> {
        self.buffers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LoopVoice {
    buffer: Arc<AudioBuffer>,
    position: f64,
    rate: f64,
}

/// Looping noise player mixed in front of the master stage
pub struct CrackleProcessor {
    channels: usize,
    output_rate: f64,
    voice: Option<LoopVoice>,
    gain: f32,
    destroyed: bool,
}

impl CrackleProcessor {
    pub fn new(context: &EngineContext) -> Self {
        Self {
            channels: context.channel_count(),
            output_rate: context.sample_rate as f64,
            voice: None,
            gain: 0.0,
            destroyed: false,
        }
    }

    /// Stop any current loop and start `buffer` from its beginning
    pub fn play(&mut self, buffer: Arc<AudioBuffer>, intensity: f32) {
        self.stop();
        if self.destroyed || buffer.is_empty() {
            return;
        }
        self.voice = Some(LoopVoice {
            buffer,
            position: 0.0,
            rate: 1.0,
        });
        self.gain = clamp_unit(intensity);
    }

    /// Retune the current loop for a main playback rate of `pitch_ratio`
    pub fn set_pitch(&mut self, pitch_ratio: f64) {
        if let Some(voice) = self.voice.as_mut() {
            voice.rate = crackle_rate(pitch_ratio);
        }
    }

    /// Change the mix gain without restarting
    pub fn set_intensity(&mut self, intensity: f32) {
        self.gain = clamp_unit(intensity);
    }

    /// Release the current loop; the cache is untouched
    pub fn stop(&mut self) {
        self.voice = None;
    }

    pub fn destroy(&mut self) {
        self.stop();
        self.destroyed = true;
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_some()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn rate(&self) -> Option<f64> {
        self.voice.as_ref().map(|v| v.rate)
    }

    /// Write the gained noise into `out` (interleaved). Returns false and
    /// leaves `out` zeroed when nothing is playing.
    pub fn render(&mut self, out: &mut [f32]) -> bool {
        out.fill(0.0);
        let channels = self.channels;
        let gain = self.gain;
        let output_rate = self.output_rate;
        let voice = match self.voice.as_mut() {
            Some(v) => v,
            None => return false,
        };

        let frames = voice.buffer.frames();
        let src_channels = voice.buffer.channels() as usize;
        let step = voice.rate * voice.buffer.sample_rate() as f64 / output_rate;

        for frame in out.chunks_exact_mut(channels) {
            let idx = voice.position as usize;
            let frac = (voice.position - idx as f64) as f32;
            let next = if idx + 1 >= frames { 0 } else { idx + 1 };

            for (ch, sample) in frame.iter_mut().enumerate() {
                let src_ch = if src_channels == 1 { 0 } else { ch.min(src_channels - 1) };
                let a = voice.buffer.sample(idx, src_ch);
                let b = voice.buffer.sample(next, src_ch);
                *sample = (a + (b - a) * frac) * gain;
            }

            voice.position += step;
            if voice.position >= frames as f64 {
                voice.position %= frames as f64;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DecodeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAssets {
        fetches: AtomicUsize,
    }

    impl AssetSource for CountingAssets {
        fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetLoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if name == "missing.wav" {
                Err(AssetLoadError::NotFound(name.to_string()))
            } else {
                Ok(vec![1, 2, 3, 4])
            }
        }
    }

    struct ConstDecoder;

    impl AudioDecoder for ConstDecoder {
        fn decode(&self, bytes: &[u8], _hint: Option<&str>) -> Result<AudioBuffer, DecodeError> {
            let samples = bytes.iter().map(|&b| b as f32 / 10.0).collect();
            Ok(AudioBuffer::new(samples, 1, 44100))
        }
    }

    fn bank() -> (NoiseBank, Arc<CountingAssets>) {
        let assets = Arc::new(CountingAssets {
            fetches: AtomicUsize::new(0),
        });
        let bank = NoiseBank::new(assets.clone(), Arc::new(ConstDecoder));
        (bank, assets)
    }

    #[test]
    fn test_load_is_idempotent() {
        let (bank, assets) = bank();
        let a = bank.load("crackle13.wav").unwrap();
        let b = bank.load("crackle13.wav").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(assets.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_missing_asset_not_cached() {
        let (bank, _) = bank();
        assert!(matches!(bank.load("missing.wav"), Err(AssetLoadError::NotFound(_))));
        assert!(!bank.contains("missing.wav"));
    }

    #[test]
    fn test_pitch_tracking() {
        assert_eq!(crackle_rate(1.0), 1.0);
        assert!((crackle_rate(2.0) - 1.3).abs() < 1e-12);
        assert!((crackle_rate(0.5) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_play_loops_with_gain() {
        let mut crackle = CrackleProcessor::new(&EngineContext::new(4, 1));
        let buffer = Arc::new(AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 1, 4));
        crackle.play(buffer, 0.5);
        let mut out = vec![0.0f32; 8];
        assert!(crackle.render(&mut out));
        let expected = [0.05, 0.1, 0.15, 0.2, 0.05, 0.1, 0.15, 0.2];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_pitch_only_affects_live_loop() {
        let mut crackle = CrackleProcessor::new(&EngineContext::default());
        crackle.set_pitch(2.0);
        assert_eq!(crackle.rate(), None);

        crackle.play(Arc::new(AudioBuffer::silent(100, 2, 44100)), 2.0);
        assert_eq!(crackle.gain(), 1.0);
        crackle.set_pitch(2.0);
        assert!((crackle.rate().unwrap() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_stop_and_intensity() {
        let mut crackle = CrackleProcessor::new(&EngineContext::default());
        crackle.play(Arc::new(AudioBuffer::silent(100, 2, 44100)), 0.2);
        crackle.set_intensity(0.7);
        assert!(crackle.is_playing());
        assert_eq!(crackle.gain(), 0.7);
        crackle.stop();
        assert!(!crackle.is_playing());
        let mut out = vec![1.0f32; 4];
        assert!(!crackle.render(&mut out));
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
