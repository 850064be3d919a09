//! Sine low-frequency oscillator

use std::f64::consts::TAU;

/// Free-running sine LFO with a phase accumulator in cycles.
///
/// The phase is kept in f64 so very slow rates do not stall.
#[derive(Debug, Clone)]
pub struct Lfo {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
}

impl Lfo {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            frequency: frequency.max(0.0) as f64,
            sample_rate: sample_rate.max(1.0) as f64,
            phase: 0.0,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency as f32
    }

    /// Current value in [-1, 1] without advancing
    #[inline]
    pub fn value(&self) -> f32 {
        (self.phase * TAU).sin() as f32
    }

    /// Current value, then advance one sample
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let v = self.value();
        self.advance(1);
        v
    }

    /// Advance by `frames` samples
    #[inline]
    pub fn advance(&mut self, frames: usize) {
        self.phase += self.frequency * frames as f64 / self.sample_rate;
        self.phase -= self.phase.floor();
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_starts_at_zero() {
        let lfo = Lfo::new(2.5, 44100.0);
        assert_eq!(lfo.value(), 0.0);
    }

    #[test]
    fn test_quarter_cycle_peak() {
        let mut lfo = Lfo::new(1.0, 1000.0);
        lfo.advance(250);
        assert_relative_eq!(lfo.value(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_block_advance_matches_samples() {
        let mut a = Lfo::new(0.13, 48000.0);
        let mut b = Lfo::new(0.13, 48000.0);
        for _ in 0..128 {
            a.next_sample();
        }
        b.advance(128);
        assert_relative_eq!(a.value(), b.value(), epsilon = 1e-6);
    }
}
