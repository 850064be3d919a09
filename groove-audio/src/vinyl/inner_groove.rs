//! Inner groove distortion - tracking error near the label
//!
//! Compressed copy of the signal through a soft-clip curve, blended over
//! the untouched dry path.

use std::f32::consts::PI;

use crate::dsp::{Compressor, CompressorSettings};
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

const BASE: CompressorSettings = CompressorSettings {
    threshold_db: -30.0,
    knee_db: 15.0,
    ratio: 1.0,
    attack_secs: 0.001,
    release_secs: 0.1,
};

const DEG: f32 = PI / 180.0;

/// Soft-clip transfer `((3 + k) * x * 20deg) / (pi + k * |x|)`, input clamped to [-1, 1]
#[inline]
pub fn shape(x: f32, drive: f32) -> f32 {
    let x = x.clamp(-1.0, 1.0);
    ((3.0 + drive) * x * 20.0 * DEG) / (PI + drive * x.abs())
}

pub struct InnerGrooveDistortion {
    amount: f32,
    drive: f32,
    wet_gain: f32,
    dry_gain: f32,
    compressor: Compressor,
    wet: Vec<f32>,
    destroyed: bool,
}

impl InnerGrooveDistortion {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let mut groove = Self {
            amount: 0.0,
            drive: 0.0,
            wet_gain: 0.0,
            dry_gain: 1.0,
            compressor: Compressor::new(sr, ch, BASE),
            wet: Vec::with_capacity(crate::stage::RENDER_QUANTUM * ch),
            destroyed: false,
        };
        groove.set_amount(0.0);
        groove
    }

    pub fn set_amount(&mut self, amount: f32) {
        let a = clamp_unit(amount);
        self.amount = a;
        self.drive = 50.0 * a;
        self.wet_gain = a;
        self.dry_gain = 1.0 - 0.5 * a;
        self.compressor.set_ratio(1.0 + 5.0 * a);
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// (wet, dry) gains
    pub fn mix(&self) -> (f32, f32) {
        (self.wet_gain, self.dry_gain)
    }

    pub fn ratio(&self) -> f32 {
        self.compressor.settings().ratio
    }
}

impl Stage for InnerGrooveDistortion {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }

        // The compressor keeps running at zero wet so its envelope is warm
        self.wet.clear();
        self.wet.extend_from_slice(samples);
        self.compressor.process_interleaved(&mut self.wet);

        for (out, &wet) in samples.iter_mut().zip(self.wet.iter()) {
            *out = *out * self.dry_gain + shape(wet, self.drive) * self.wet_gain;
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "innerGroove" | "amount" => self.set_amount(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
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
        "innerGroove"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mix_mapping() {
        let mut groove = InnerGrooveDistortion::new(&EngineContext::default());
        assert_eq!(groove.mix(), (0.0, 1.0));
        groove.set_parameter("innerGroove", 1.0);
        assert_eq!(groove.mix(), (1.0, 0.5));
        assert_eq!(groove.drive(), 50.0);
        assert_eq!(groove.ratio(), 6.0);
    }

    #[test]
    fn test_curve_law() {
        // k = 0 is a gentle linear scale of 3 * 20deg / pi
        assert_relative_eq!(shape(1.0, 0.0), 3.0 * 20.0 * DEG / PI);
        assert_relative_eq!(shape(-0.5, 10.0), -(13.0 * 0.5 * 20.0 * DEG) / (PI + 5.0));
        // Clamped beyond full scale
        assert_eq!(shape(4.0, 25.0), shape(1.0, 25.0));
    }

    #[test]
    fn test_curve_is_odd_and_monotonic() {
        let mut prev = shape(-1.0, 50.0);
        for i in 1..=200 {
            let x = -1.0 + i as f32 * 0.01;
            let y = shape(x, 50.0);
            assert!(y >= prev);
            assert_relative_eq!(shape(-x, 50.0), -y, epsilon = 1e-6);
            prev = y;
        }
    }

    #[test]
    fn test_zero_amount_is_dry() {
        let mut groove = InnerGrooveDistortion::new(&EngineContext::default());
        let mut block: Vec<f32> = (0..256).map(|i| (i as f32 * 0.07).cos() * 0.8).collect();
        let original = block.clone();
        groove.process(&mut block);
        assert_eq!(block, original);
    }
}
