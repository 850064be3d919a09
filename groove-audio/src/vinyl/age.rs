//! Age filter - high-frequency loss of an old pressing
//!
//! Low shelf at 500 Hz then a high shelf at the age corner frequency.
//! Two slow sines (0.13 Hz and 0.27 Hz) wander the high-shelf corner so
//! the dullness breathes a little.

use crate::dsp::{Biquad, BiquadKind, Lfo};
use crate::params::clamp_param;
use crate::stage::{ignore_parameter, EngineContext, Stage};

const LOW_SHELF_FREQ: f32 = 500.0;
const MIN_FREQ: f32 = 200.0;
const MAX_FREQ: f32 = 8000.0;

pub struct AgeFilter {
    channels: usize,
    frequency: f32,
    ratio: f32,
    low_shelf: Biquad,
    high_shelf: Biquad,
    slow_lfo: Lfo,
    fast_lfo: Lfo,
    slow_depth: f32,
    fast_depth: f32,
    destroyed: bool,
}

impl AgeFilter {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let mut filter = Self {
            channels: ch,
            frequency: MIN_FREQ,
            ratio: 0.0,
            low_shelf: Biquad::new(BiquadKind::LowShelf, sr, ch, LOW_SHELF_FREQ, 1.0, 0.0),
            high_shelf: Biquad::new(BiquadKind::HighShelf, sr, ch, MIN_FREQ, 1.0, 0.0),
            slow_lfo: Lfo::new(0.13, sr),
            fast_lfo: Lfo::new(0.27, sr),
            slow_depth: 0.0,
            fast_depth: 0.0,
            destroyed: false,
        };
        filter.set_frequency(MIN_FREQ);
        filter
    }

    /// Set the age corner in Hz (200-8000)
    pub fn set_frequency(&mut self, frequency: f32) {
        let f = clamp_param(frequency, MIN_FREQ, MAX_FREQ);
        let r = (f - MIN_FREQ) / (MAX_FREQ - MIN_FREQ);
        self.frequency = f;
        self.ratio = r;

        self.high_shelf.configure(BiquadKind::HighShelf, f, 1.0, -24.0 * r);
        self.low_shelf.set_gain_db(-8.0 * r.powf(1.2));
        self.slow_depth = f * 0.05 * r;
        self.fast_depth = f * 0.03 * r;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn high_shelf_gain_db(&self) -> f32 {
        self.high_shelf.gain_db()
    }

    pub fn low_shelf_gain_db(&self) -> f32 {
        self.low_shelf.gain_db()
    }

    /// Modulator depths in Hz (0.13 Hz, 0.27 Hz)
    pub fn modulation_depths(&self) -> (f32, f32) {
        (self.slow_depth, self.fast_depth)
    }

    /// Current (modulated) high-shelf corner
    pub fn modulated_frequency(&self) -> f32 {
        self.high_shelf.frequency()
    }
}

impl Stage for AgeFilter {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        let frames = samples.len() / self.channels;

        if self.slow_depth > 0.0 || self.fast_depth > 0.0 {
            let corner = self.frequency
                + self.slow_lfo.value() * self.slow_depth
                + self.fast_lfo.value() * self.fast_depth;
            self.high_shelf.set_frequency(corner);
        }
        self.slow_lfo.advance(frames);
        self.fast_lfo.advance(frames);

        self.low_shelf.process_interleaved(samples);
        self.high_shelf.process_interleaved(samples);
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "age" | "ageFilter" => self.set_frequency(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.low_shelf.reset();
        self.high_shelf.reset();
        self.slow_lfo.reset();
        self.fast_lfo.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.slow_depth = 0.0;
        self.fast_depth = 0.0;
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "age"
    }
}
