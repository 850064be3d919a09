//! RIAA playback curve emphasis

use crate::dsp::{Biquad, BiquadKind};
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

/// Low shelf @50.05 Hz, peak @500.5 Hz (Q 0.7), high shelf @2122 Hz
pub struct RiaaEmphasis {
    amount: f32,
    bass: Biquad,
    mid: Biquad,
    treble: Biquad,
    destroyed: bool,
}

impl RiaaEmphasis {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let mut riaa = Self {
            amount: 0.0,
            bass: Biquad::new(BiquadKind::LowShelf, sr, ch, 50.05, 1.0, 0.0),
            mid: Biquad::new(BiquadKind::Peaking, sr, ch, 500.5, 0.7, 0.0),
            treble: Biquad::new(BiquadKind::HighShelf, sr, ch, 2122.0, 1.0, 0.0),
            destroyed: false,
        };
        riaa.set_amount(0.0);
        riaa
    }

    pub fn set_amount(&mut self, amount: f32) {
        let a = clamp_unit(amount);
        self.amount = a;
        self.bass.set_gain_db(17.0 * a);
        self.mid.set_gain_db(-8.5 * a);
        self.treble.set_gain_db(-13.7 * a);
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// (low shelf, peak, high shelf) gains in dB
    pub fn gains_db(&self) -> (f32, f32, f32) {
        (self.bass.gain_db(), self.mid.gain_db(), self.treble.gain_db())
    }
}

impl Stage for RiaaEmphasis {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        self.bass.process_interleaved(samples);
        self.mid.process_interleaved(samples);
        self.treble.process_interleaved(samples);
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "riaa" | "amount" => self.set_amount(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "riaa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_amount_is_identity() {
        let mut riaa = RiaaEmphasis::new(&EngineContext::default());
        assert_eq!(riaa.gains_db(), (0.0, 0.0, 0.0));
        let mut block: Vec<f32> = (0..512).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let original = block.clone();
        riaa.process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn test_full_amount_gains() {
        let mut riaa = RiaaEmphasis::new(&EngineContext::default());
        riaa.set_parameter("riaa", 1.0);
        assert_eq!(riaa.gains_db(), (17.0, -8.5, -13.7));
    }

    #[test]
    fn test_amount_alias_and_clamp() {
        let mut riaa = RiaaEmphasis::new(&EngineContext::default());
        riaa.set_parameter("amount", 4.0);
        assert_eq!(riaa.amount(), 1.0);
        riaa.set_parameter("amount", -1.0);
        assert_eq!(riaa.amount(), 0.0);
    }

    #[test]
    fn test_full_amount_colors_signal() {
        let mut riaa = RiaaEmphasis::new(&EngineContext::default());
        riaa.set_parameter("riaa", 1.0);
        let mut block = vec![0.1f32; 8192];
        riaa.process(&mut block);
        // Bass boost lifts DC
        assert!(block[8190] > 0.5);
    }
}
