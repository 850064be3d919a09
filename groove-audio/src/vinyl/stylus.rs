//! Stylus resonance - cartridge ringing in the top octave

use crate::dsp::{Biquad, BiquadKind};
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

/// (frequency, Q, gain per unit amount)
const RESONANCES: [(f32, f32, f32); 3] = [(17000.0, 4.5, 12.0), (14000.0, 3.5, 9.0), (10000.0, 2.5, 6.0)];

pub struct StylusResonance {
    amount: f32,
    peaks: Vec<Biquad>,
    destroyed: bool,
}

impl StylusResonance {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let peaks = RESONANCES
            .iter()
            .map(|&(freq, q, _)| Biquad::new(BiquadKind::Peaking, sr, ch, freq, q, 0.0))
            .collect();
        let mut stylus = Self {
            amount: 0.0,
            peaks,
            destroyed: false,
        };
        stylus.set_amount(0.0);
        stylus
    }

    pub fn set_amount(&mut self, amount: f32) {
        let a = clamp_unit(amount);
        self.amount = a;
        for (peak, &(_, _, gain)) in self.peaks.iter_mut().zip(RESONANCES.iter()) {
            peak.set_gain_db(gain * a);
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn gains_db(&self) -> Vec<f32> {
        self.peaks.iter().map(|p| p.gain_db()).collect()
    }
}

impl Stage for StylusResonance {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        for peak in &mut self.peaks {
            peak.process_interleaved(samples);
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "stylus" | "stylusResonance" | "amount" => self.set_amount(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.peaks.iter_mut().for_each(Biquad::reset);
    }

    fn destroy(&mut self) {
        self.reset();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "stylus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_mapping() {
        let mut stylus = StylusResonance::new(&EngineContext::default());
        stylus.set_parameter("stylusResonance", 0.5);
        assert_eq!(stylus.gains_db(), vec![6.0, 4.5, 3.0]);
        stylus.set_parameter("stylus", 2.0);
        assert_eq!(stylus.gains_db(), vec![12.0, 9.0, 6.0]);
    }

    #[test]
    fn test_resonance_frequencies() {
        let stylus = StylusResonance::new(&EngineContext::default());
        let freqs: Vec<f32> = stylus.peaks.iter().map(|p| p.frequency()).collect();
        let qs: Vec<f32> = stylus.peaks.iter().map(|p| p.q()).collect();
        assert_eq!(freqs, vec![17000.0, 14000.0, 10000.0]);
        assert_eq!(qs, vec![4.5, 3.5, 2.5]);
    }

    #[test]
    fn test_17k_peak_survives_at_low_rates() {
        // 17 kHz sits above Nyquist at 32 kHz; the section must stay finite
        let mut stylus = StylusResonance::new(&EngineContext::new(32000, 2));
        stylus.set_amount(1.0);
        let mut block = vec![0.25f32; 256];
        stylus.process(&mut block);
        assert!(block.iter().all(|s| s.is_finite()));
    }
}
