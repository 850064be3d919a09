//! Transport source - reads the loaded buffer at a playback rate
//!
//! One source per session. The base rate is the pitch ratio; the spindle
//! modulation is added per frame. Buffers at a different sample rate from
//! the output are rate-corrected here.

use std::sync::Arc;

use crate::buffer::AudioBuffer;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    /// Reached the end of the buffer on its own
    Ended,
}

pub struct Transport {
    channels: usize,
    output_rate: f64,
    buffer: Option<Arc<AudioBuffer>>,
    // Position in source frames
    position: f64,
    rate: f64,
    delay_frames: u64,
    state: PlaybackState,
}

impl Transport {
    pub fn new(channels: usize, output_rate: u32) -> Self {
        Self {
            channels: channels.max(1),
            output_rate: output_rate.max(1) as f64,
            buffer: None,
            position: 0.0,
            rate: 1.0,
            delay_frames: 0,
            state: PlaybackState::Stopped,
        }
    }

    /// Replace the buffer; any playback stops
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        self.buffer = Some(buffer);
        self.stop();
        self.position = 0.0;
    }

    /// Start at `offset_secs` after `delay_frames` frames of silence
    pub fn start(&mut self, offset_secs: f64, rate: f64, delay_frames: u64) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let offset = (offset_secs.max(0.0) * buffer.sample_rate() as f64).min(buffer.frames() as f64);
        self.position = offset;
        self.rate = sanitize_rate(rate);
        self.delay_frames = delay_frames;
        self.state = PlaybackState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.delay_frames = 0;
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = sanitize_rate(rate);
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position in seconds of source time
    pub fn position_secs(&self) -> f64 {
        match self.buffer.as_ref() {
            Some(b) => self.position / b.sample_rate() as f64,
            None => 0.0,
        }
    }

    /// Write one output frame. `modulation` is added to the base rate.
    #[inline]
    pub fn read_frame(&mut self, modulation: f64, frame: &mut [f32]) {
        if self.state != PlaybackState::Playing {
            frame.fill(0.0);
            return;
        }
        let Some(buffer) = self.buffer.as_ref() else {
            frame.fill(0.0);
            return;
        };
        if self.delay_frames > 0 {
            self.delay_frames -= 1;
            frame.fill(0.0);
            return;
        }

        let frames = buffer.frames();
        let idx = self.position as usize;
        if idx >= frames {
            self.state = PlaybackState::Ended;
            frame.fill(0.0);
            return;
        }

        let frac = (self.position - idx as f64) as f32;
        let next = (idx + 1).min(frames - 1);
        let src_channels = buffer.channels() as usize;

        for (ch, sample) in frame.iter_mut().enumerate() {
            let src_ch = if src_channels == 1 { 0 } else { ch.min(src_channels - 1) };
            let a = buffer.sample(idx, src_ch);
            if frac == 0.0 {
                *sample = a;
            } else {
                let b = buffer.sample(next, src_ch);
                *sample = a + frac * (b - a);
            }
        }

        let step = (self.rate + modulation).max(0.0) * buffer.sample_rate() as f64 / self.output_rate;
        self.position += step;
    }

    /// Fill an interleaved block with no modulation
    pub fn process(&mut self, output: &mut [f32]) {
        let channels = self.channels;
        for frame in output.chunks_exact_mut(channels) {
            self.read_frame(0.0, frame);
        }
    }
}

#[inline]
fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        1.0
    }
}
