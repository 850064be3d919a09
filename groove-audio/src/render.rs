//! Offline rendering - bounce a session to a finished buffer or WAV file
//!
//! Builds its own signal path from the same chain factory as the live
//! engine, so no stage instance is ever shared with a playing session.
//! Runs synchronously on the calling thread.

use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::AudioBuffer;
use crate::mastering::MasteringMode;
use crate::params::{EffectParameters, ParamId, ParameterBank};
use crate::path::{PathCommand, SignalPath};
use crate::stage::EngineContext;
use crate::transport::Transport;
use crate::wav::{encode_pcm16, WavError};

/// Seconds of silence rendered ahead of the audio, trimmed afterwards
pub const PADDING_SECS: f64 = 0.1;

/// Pitch shift limits in semitones
pub const PITCH_RANGE: (f32, f32) = (-12.0, 12.0);

const BLOCK_FRAMES: usize = 4096;

/// Playback rate for a pitch shift
#[inline]
pub fn pitch_ratio(semitones: f32) -> f64 {
    2f64.powf(semitones as f64 / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Every stage, the crackle loop and the master bus
    #[default]
    FullChain,
    /// Only the pitch-shifted transport
    PitchOnly,
}

/// Everything an offline render needs, detached from any live engine
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub buffer: Arc<AudioBuffer>,
    pub params: EffectParameters,
    /// Effective spindle intensity when it differs from `params.spindle`
    /// (the `warp` alias was written last)
    pub spindle_intensity: Option<f32>,
    pub pitch_semitones: f32,
    pub mastering: MasteringMode,
    pub noise: Option<Arc<AudioBuffer>>,
    pub seed: u64,
    pub mode: RenderMode,
}

impl RenderJob {
    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self {
            buffer,
            params: EffectParameters::default(),
            spindle_intensity: None,
            pitch_semitones: 0.0,
            mastering: MasteringMode::default(),
            noise: None,
            seed: 0,
            mode: RenderMode::default(),
        }
    }
}

/// Frame counts for one render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlan {
    pub pitch_ratio: f64,
    pub padding_frames: usize,
    pub adjusted_frames: usize,
}

impl RenderPlan {
    pub fn new(source_frames: usize, sample_rate: u32, pitch_semitones: f32) -> Self {
        let (lo, hi) = PITCH_RANGE;
        let semitones = if pitch_semitones.is_finite() {
            pitch_semitones.clamp(lo, hi)
        } else {
            0.0
        };
        let ratio = pitch_ratio(semitones);
        Self {
            pitch_ratio: ratio,
            padding_frames: (PADDING_SECS * sample_rate as f64).floor() as usize,
            adjusted_frames: (source_frames as f64 / ratio).floor() as usize,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.adjusted_frames + self.padding_frames
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OfflineRenderer {
    block_frames: usize,
}

impl Default for OfflineRenderer {
    fn default() -> Self {
        Self {
            block_frames: BLOCK_FRAMES,
        }
    }
}

impl OfflineRenderer {
    pub fn new(block_frames: usize) -> Self {
        Self {
            block_frames: block_frames.max(1),
        }
    }

    /// Render `job` and return the audio with the leading padding removed
    pub fn render(&self, job: &RenderJob) -> AudioBuffer {
        let source = &job.buffer;
        let context = EngineContext::new(source.sample_rate(), source.channels());
        let channels = context.channel_count();
        let plan = RenderPlan::new(source.frames(), context.sample_rate, job.pitch_semitones);

        debug!(
            frames = plan.total_frames(),
            padding = plan.padding_frames,
            ratio = plan.pitch_ratio,
            mode = ?job.mode,
            "offline render"
        );

        let mut out = vec![0.0f32; plan.total_frames() * channels];
        match job.mode {
            RenderMode::FullChain => self.render_chain(job, context, &plan, &mut out),
            RenderMode::PitchOnly => {
                let mut transport = Transport::new(channels, context.sample_rate);
                transport.load(Arc::clone(source));
                transport.start(0.0, plan.pitch_ratio, plan.padding_frames as u64);
                for block in out.chunks_mut(self.block_frames * channels) {
                    transport.process(block);
                }
            }
        }

        let trimmed = out.split_off(plan.padding_frames * channels);
        AudioBuffer::new(trimmed, context.channels, context.sample_rate)
    }

    fn render_chain(&self, job: &RenderJob, context: EngineContext, plan: &RenderPlan, out: &mut [f32]) {
        let bank = ParameterBank::new(&job.params);
        if let Some(intensity) = job.spindle_intensity {
            bank.store(ParamId::Spindle, intensity);
        }

        let mut path = SignalPath::new(context, Arc::new(bank), job.seed);
        path.apply(PathCommand::SetMastering(job.mastering));
        path.apply(PathCommand::Load(Arc::clone(&job.buffer)));
        path.start_delayed(0.0, plan.pitch_ratio, plan.padding_frames as u64);
        if let Some(noise) = job.noise.as_ref() {
            path.apply(PathCommand::StartCrackle {
                buffer: Arc::clone(noise),
                intensity: job.params.crackle,
                pitch_ratio: plan.pitch_ratio,
            });
        }
        path.dropout_switch().start();

        for block in out.chunks_mut(self.block_frames * context.channel_count()) {
            path.process(block);
        }
        path.destroy();
    }

    /// Render and encode to 16-bit WAV. `progress` sees 0.0, 0.9 and 1.0.
    pub fn export(&self, job: &RenderJob, mut progress: impl FnMut(f32)) -> Result<Vec<u8>, WavError> {
        progress(0.0);
        let rendered = self.render(job);
        progress(0.9);
        let bytes = encode_pcm16(&rendered)?;
        progress(1.0);
        info!(frames = rendered.frames(), bytes = bytes.len(), "export complete");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::wav::read_pcm16;

    fn sine(frames: usize, channels: u16) -> Arc<AudioBuffer> {
        let samples = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 0.02).sin() * 0.4;
                std::iter::repeat(s).take(channels as usize)
            })
            .collect();
        Arc::new(AudioBuffer::new(samples, channels, 8000))
    }

    #[test]
    fn test_plan() {
        let plan = RenderPlan::new(1000, 44100, 0.0);
        assert_eq!(plan.pitch_ratio, 1.0);
        assert_eq!(plan.padding_frames, 4410);
        assert_eq!(plan.adjusted_frames, 1000);
        assert_eq!(plan.total_frames(), 5410);

        let up = RenderPlan::new(1001, 44100, 12.0);
        assert_eq!(up.adjusted_frames, 500);
        let clamped = RenderPlan::new(1000, 44100, 40.0);
        assert_eq!(clamped.pitch_ratio, 2.0);
    }

    #[test]
    fn test_export_length_matches_source() {
        let job = RenderJob::new(sine(3000, 2));
        let bytes = OfflineRenderer::default().export(&job, |_| {}).unwrap();
        let data_len = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_len, 3000 * 2 * 2);
        assert_eq!(bytes.len(), 44 + 3000 * 2 * 2);
    }

    #[test]
    fn test_progress_sequence() {
        let mut seen = Vec::new();
        let job = RenderJob::new(sine(100, 1));
        OfflineRenderer::default().export(&job, |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![0.0, 0.9, 1.0]);
    }

    #[test]
    fn test_pitch_only_reproduces_input() {
        let source = sine(500, 2);
        let mut job = RenderJob::new(Arc::clone(&source));
        job.mode = RenderMode::PitchOnly;
        let rendered = OfflineRenderer::new(64).render(&job);
        assert_eq!(rendered.samples(), source.samples());

        let decoded = read_pcm16(&OfflineRenderer::default().export(&job, |_| {}).unwrap()).unwrap();
        for (a, b) in source.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_pitch_up_halves_length() {
        let mut job = RenderJob::new(sine(2000, 2));
        job.pitch_semitones = 12.0;
        let rendered = OfflineRenderer::default().render(&job);
        assert_eq!(rendered.frames(), 1000);
    }

    #[test]
    fn test_full_chain_is_deterministic() {
        let preset = presets::find("vinyl-erosion").unwrap();
        let mut job = RenderJob::new(sine(6000, 2));
        job.params = preset.params;
        job.mastering = MasteringMode::Motown;
        job.noise = Some(Arc::new(AudioBuffer::new(
            (0..400).map(|i| if i % 37 == 0 { 0.5 } else { 0.0 }).collect(),
            2,
            8000,
        )));
        job.seed = 99;

        let renderer = OfflineRenderer::default();
        let a = renderer.export(&job, |_| {}).unwrap();
        let b = renderer.export(&job, |_| {}).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_chain_mixes_crackle() {
        let mut job = RenderJob::new(Arc::new(AudioBuffer::silent(2000, 2, 8000)));
        job.noise = Some(Arc::new(AudioBuffer::new(vec![0.3; 200], 2, 8000)));
        job.params.crackle = 1.0;
        let rendered = OfflineRenderer::default().render(&job);
        assert_eq!(rendered.frames(), 2000);
        assert!(rendered.samples().iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_empty_buffer_exports_header_only() {
        let job = RenderJob::new(Arc::new(AudioBuffer::silent(0, 2, 8000)));
        let bytes = OfflineRenderer::default().export(&job, |_| {}).unwrap();
        assert_eq!(bytes.len(), 44);
    }
}
