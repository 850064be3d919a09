//! Pinch effect - groove pinch brightness squeezed by compression

use crate::dsp::{Biquad, BiquadKind, Compressor, CompressorSettings};
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

const BASE: CompressorSettings = CompressorSettings {
    threshold_db: -20.0,
    knee_db: 10.0,
    ratio: 1.0,
    attack_secs: 0.003,
    release_secs: 0.05,
};

pub struct PinchEffect {
    amount: f32,
    shelf: Biquad,
    compressor: Compressor,
    destroyed: bool,
}

impl PinchEffect {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let mut pinch = Self {
            amount: 0.0,
            shelf: Biquad::new(BiquadKind::HighShelf, sr, ch, 3000.0, 1.0, 0.0),
            compressor: Compressor::new(sr, ch, BASE),
            destroyed: false,
        };
        pinch.set_amount(0.0);
        pinch
    }

    pub fn set_amount(&mut self, amount: f32) {
        let a = clamp_unit(amount);
        self.amount = a;
        self.shelf.set_gain_db(6.0 * a);
        self.compressor.set_ratio(1.0 + 3.0 * a);
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn shelf_gain_db(&self) -> f32 {
        self.shelf.gain_db()
    }

    pub fn ratio(&self) -> f32 {
        self.compressor.settings().ratio
    }
}

impl Stage for PinchEffect {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        self.shelf.process_interleaved(samples);
        self.compressor.process_interleaved(samples);
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "pinch" | "amount" => self.set_amount(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.shelf.reset();
        self.compressor.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "pinch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        let mut pinch = PinchEffect::new(&EngineContext::default());
        assert_eq!(pinch.ratio(), 1.0);
        pinch.set_parameter("pinch", 1.0);
        assert_eq!(pinch.shelf_gain_db(), 6.0);
        assert_eq!(pinch.ratio(), 4.0);
        pinch.set_parameter("amount", 0.5);
        assert_eq!(pinch.ratio(), 2.5);
    }

    #[test]
    fn test_zero_amount_transparent() {
        let mut pinch = PinchEffect::new(&EngineContext::default());
        let mut block: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin() * 0.9).collect();
        let original = block.clone();
        pinch.process(&mut block);
        for (a, b) in block.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
