//! Worn stylus - lost bass, honky mid resonances and phase smear

use crate::dsp::{Biquad, BiquadKind, Lfo};
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

const ALLPASS_LOW: f32 = 750.0;
const ALLPASS_HIGH: f32 = 2500.0;
const SMEAR_RATE: f32 = 0.5;

pub struct WornStylus {
    channels: usize,
    intensity: f32,
    pre_emphasis: Biquad,
    low_cut: Biquad,
    resonance_low: Biquad,
    resonance_high: Biquad,
    allpass_low: Biquad,
    allpass_high: Biquad,
    lfo: Lfo,
    lfo_depth: f32,
    destroyed: bool,
}

impl WornStylus {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let mut worn = Self {
            channels: ch,
            intensity: 0.0,
            pre_emphasis: Biquad::new(BiquadKind::Peaking, sr, ch, 1800.0, 1.0, 0.0),
            low_cut: Biquad::new(BiquadKind::Highpass, sr, ch, 80.0, 1.0, 0.0),
            resonance_low: Biquad::new(BiquadKind::Peaking, sr, ch, 800.0, 1.5, 0.0),
            resonance_high: Biquad::new(BiquadKind::Peaking, sr, ch, 2800.0, 2.0, 0.0),
            allpass_low: Biquad::new(BiquadKind::Allpass, sr, ch, ALLPASS_LOW, 1.0, 0.0),
            allpass_high: Biquad::new(BiquadKind::Allpass, sr, ch, ALLPASS_HIGH, 1.0, 0.0),
            lfo: Lfo::new(SMEAR_RATE, sr),
            lfo_depth: 0.0,
            destroyed: false,
        };
        worn.set_intensity(0.0);
        worn
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        let a = clamp_unit(intensity);
        self.intensity = a;

        self.pre_emphasis.set_gain_db(3.0 * a);
        self.low_cut.set_frequency(80.0 + 600.0 * a);

        let q_low = 1.5 + 2.0 * a;
        let q_high = 2.0 + 1.5 * a;
        self.resonance_low.configure(BiquadKind::Peaking, 800.0, q_low, 4.0 * a);
        self.resonance_high.configure(BiquadKind::Peaking, 2800.0, q_high, 3.0 * a);

        self.lfo_depth = 100.0 * a;
        if self.lfo_depth == 0.0 {
            self.allpass_low.set_frequency(ALLPASS_LOW);
            self.allpass_high.set_frequency(ALLPASS_HIGH);
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn low_cut_frequency(&self) -> f32 {
        self.low_cut.frequency()
    }

    pub fn lfo_depth(&self) -> f32 {
        self.lfo_depth
    }
}

impl Stage for WornStylus {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        let frames = samples.len() / self.channels;

        if self.lfo_depth > 0.0 {
            let offset = self.lfo.value() * self.lfo_depth;
            self.allpass_low.set_frequency(ALLPASS_LOW + offset);
            self.allpass_high.set_frequency(ALLPASS_HIGH + offset);
        }
        self.lfo.advance(frames);

        self.pre_emphasis.process_interleaved(samples);
        self.low_cut.process_interleaved(samples);
        self.resonance_low.process_interleaved(samples);
        self.resonance_high.process_interleaved(samples);
        self.allpass_low.process_interleaved(samples);
        self.allpass_high.process_interleaved(samples);
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "wornStylus" | "intensity" | "amount" => self.set_intensity(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.pre_emphasis.reset();
        self.low_cut.reset();
        self.resonance_low.reset();
        self.resonance_high.reset();
        self.allpass_low.reset();
        self.allpass_high.reset();
        self.lfo.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.lfo_depth = 0.0;
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "wornStylus"
    }
}
