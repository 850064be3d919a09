//! Ghost echo - pre/post echo bleeding from adjacent grooves
//!
//! Three fixed taps on a one second delay line, summed into a wet bus over
//! a unity dry path.

use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

/// (delay seconds, gain per unit amount)
const TAPS: [(f32, f32); 3] = [(0.05, 0.3), (0.12, 0.2), (0.23, 0.15)];
const MAX_DELAY_SECS: f32 = 1.0;

pub struct GhostEcho {
    channels: usize,
    amount: f32,
    tap_frames: [usize; 3],
    tap_gains: [f32; 3],
    wet_mix: f32,
    // Interleaved ring buffer
    buffer: Vec<f32>,
    capacity_frames: usize,
    write_frame: usize,
    destroyed: bool,
}

impl GhostEcho {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let capacity_frames = (sr * MAX_DELAY_SECS) as usize + 1;
        let tap_frames = TAPS.map(|(secs, _)| ((secs * sr).round() as usize).clamp(1, capacity_frames - 1));
        Self {
            channels: ch,
            amount: 0.0,
            tap_frames,
            tap_gains: [0.0; 3],
            wet_mix: 0.0,
            buffer: vec![0.0; capacity_frames * ch],
            capacity_frames,
            write_frame: 0,
            destroyed: false,
        }
    }

    pub fn set_amount(&mut self, amount: f32) {
        let a = clamp_unit(amount);
        self.amount = a;
        self.tap_gains = TAPS.map(|(_, g)| g * a);
        self.wet_mix = a;
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn tap_gains(&self) -> [f32; 3] {
        self.tap_gains
    }

    pub fn tap_frames(&self) -> [usize; 3] {
        self.tap_frames
    }

    #[inline]
    fn read(&self, frames_ago: usize, channel: usize) -> f32 {
        let frame = (self.write_frame + self.capacity_frames - frames_ago) % self.capacity_frames;
        self.buffer[frame * self.channels + channel]
    }
}

impl Stage for GhostEcho {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        let channels = self.channels;
        for frame in samples.chunks_exact_mut(channels) {
            let base = self.write_frame * channels;
            self.buffer[base..base + channels].copy_from_slice(frame);

            if self.wet_mix > 0.0 {
                for (ch, sample) in frame.iter_mut().enumerate() {
                    let wet: f32 = self
                        .tap_frames
                        .iter()
                        .zip(self.tap_gains.iter())
                        .map(|(&d, &g)| self.read(d, ch) * g)
                        .sum();
                    *sample += wet * self.wet_mix;
                }
            }

            self.write_frame = (self.write_frame + 1) % self.capacity_frames;
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "ghostEcho" | "amount" => self.set_amount(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_frame = 0;
    }

    fn destroy(&mut self) {
        self.reset();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "ghostEcho"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tap_layout() {
        let echo = GhostEcho::new(&EngineContext::new(1000, 1));
        assert_eq!(echo.tap_frames(), [50, 120, 230]);
    }

    #[test]
    fn test_gain_mapping() {
        let mut echo = GhostEcho::new(&EngineContext::default());
        echo.set_parameter("ghostEcho", 1.0);
        assert_eq!(echo.tap_gains(), [0.3, 0.2, 0.15]);
        echo.set_parameter("amount", 0.5);
        assert_eq!(echo.tap_gains(), [0.15, 0.1, 0.075]);
    }

    #[test]
    fn test_impulse_echoes() {
        let mut echo = GhostEcho::new(&EngineContext::new(1000, 1));
        echo.set_amount(1.0);
        let mut block = vec![0.0f32; 300];
        block[0] = 1.0;
        echo.process(&mut block);
        // Dry path is unity
        assert_eq!(block[0], 1.0);
        // Tap gain times wet mix
        assert_relative_eq!(block[50], 0.3);
        assert_relative_eq!(block[120], 0.2);
        assert_relative_eq!(block[230], 0.15);
        assert_eq!(block[51], 0.0);
    }

    #[test]
    fn test_zero_amount_is_dry() {
        let mut echo = GhostEcho::new(&EngineContext::default());
        let mut block: Vec<f32> = (0..512).map(|i| i as f32 / 512.0).collect();
        let original = block.clone();
        echo.process(&mut block);
        assert_eq!(block, original);
    }
}
