//! Decoded audio storage

/// Immutable interleaved float audio.
///
/// Owned through `Arc` once loaded; a new load replaces the whole buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            channels,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Silent buffer of `frames` frames
    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames * channels.max(1) as usize], channels, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` for `channel`, zero when out of range
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let ch = self.channels as usize;
        if channel >= ch {
            return 0.0;
        }
        self.samples.get(frame * ch + channel).copied().unwrap_or(0.0)
    }
}
