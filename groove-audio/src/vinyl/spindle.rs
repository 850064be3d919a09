//! Spindle eccentricity - off-center hole pitch wobble
//!
//! Audio passes through untouched. The stage produces a playback-rate
//! modulation signal that the transport adds to its rate per frame.

use crate::dsp::Lfo;
use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

/// (rate Hz, depth per unit intensity)
const WOBBLES: [(f32, f32); 3] = [(0.3, 0.02), (2.5, 0.01), (8.0, 0.005)];

pub struct SpindleEccentricity {
    intensity: f32,
    lfos: [Lfo; 3],
    depths: [f32; 3],
    destroyed: bool,
}

impl SpindleEccentricity {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        Self {
            intensity: 0.0,
            lfos: WOBBLES.map(|(rate, _)| Lfo::new(rate, sr)),
            depths: [0.0; 3],
            destroyed: false,
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        let i = clamp_unit(intensity);
        self.intensity = i;
        self.depths = WOBBLES.map(|(_, depth)| depth * i);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn depths(&self) -> [f32; 3] {
        self.depths
    }

    /// Next frame of rate modulation (summed sines, zero when idle)
    #[inline]
    pub fn next_modulation(&mut self) -> f32 {
        if self.destroyed {
            return 0.0;
        }
        self.lfos
            .iter_mut()
            .zip(self.depths.iter())
            .map(|(lfo, &depth)| lfo.next_sample() * depth)
            .sum()
    }

    /// Peak modulation magnitude
    pub fn max_modulation(&self) -> f32 {
        self.depths.iter().sum()
    }
}

impl Stage for SpindleEccentricity {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "spindle" | "warp" | "intensity" => self.set_intensity(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.lfos.iter_mut().for_each(Lfo::reset);
    }

    fn destroy(&mut self) {
        self.reset();
        self.depths = [0.0; 3];
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "spindle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_mapping_and_aliases() {
        let mut spindle = SpindleEccentricity::new(&EngineContext::default());
        spindle.set_parameter("warp", 1.0);
        assert_eq!(spindle.depths(), [0.02, 0.01, 0.005]);
        spindle.set_parameter("spindle", 0.0);
        assert_eq!(spindle.depths(), [0.0, 0.0, 0.0]);
        spindle.set_parameter("intensity", 7.0);
        assert_eq!(spindle.intensity(), 1.0);
    }

    #[test]
    fn test_audio_passes_through() {
        let mut spindle = SpindleEccentricity::new(&EngineContext::default());
        spindle.set_intensity(1.0);
        let mut block = vec![0.3f32, -0.3, 0.1, 0.2];
        spindle.process(&mut block);
        assert_eq!(block, vec![0.3, -0.3, 0.1, 0.2]);
    }

    #[test]
    fn test_modulation_bounded() {
        let mut spindle = SpindleEccentricity::new(&EngineContext::default());
        spindle.set_intensity(1.0);
        let bound = spindle.max_modulation() + 1e-6;
        let mut moved = false;
        for _ in 0..44100 {
            let m = spindle.next_modulation();
            assert!(m.abs() <= bound);
            moved |= m.abs() > 1e-4;
        }
        assert!(moved);
    }

    #[test]
    fn test_idle_has_no_modulation() {
        let mut spindle = SpindleEccentricity::new(&EngineContext::default());
        for _ in 0..1000 {
            assert_eq!(spindle.next_modulation(), 0.0);
        }
    }
}
