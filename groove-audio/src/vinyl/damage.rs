//! Vinyl damage - scheduled amplitude dropouts
//!
//! A sample-counter state machine ticked from the audio path. Each cycle
//! rolls a dropout depth; a deep enough roll dips the gain exponentially
//! to `max(0.001, 1 - depth)` over 10 ms and recovers over 50 ms. The next
//! cycle lands after a jittered interval that shortens with dropout
//! intensity.
//!
//! Running state is a shared atomic flag (`DropoutSwitch`). Clearing it
//! cancels the pending cycle and any ramp on the next processed frame and
//! snaps the gain back to unity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::params::clamp_unit;
use crate::stage::{ignore_parameter, EngineContext, Stage};

/// Rolls at or below this depth do not dip
pub const DEPTH_THRESHOLD: f32 = 0.01;
/// Floor of the dip target
pub const MIN_GAIN: f32 = 0.001;
const DIP_SECS: f32 = 0.01;
const RECOVER_SECS: f32 = 0.05;

/// Depth of one cycle. `extreme_roll` is a uniform draw in [0, 1).
pub fn dropout_depth(dropout: f32, deterioration: f32, extreme_roll: f32) -> f32 {
    let base = 0.5 * dropout;
    let boost = 0.3 * deterioration;
    let extreme = if extreme_roll < 0.1 * deterioration { 0.4 } else { 0.0 };
    base + boost + extreme
}

/// Seconds until the next cycle. `jitter_roll` is a uniform draw in [0, 1).
pub fn next_interval_secs(dropout: f32, jitter_roll: f32) -> f32 {
    (0.2 + jitter_roll * 0.4) * (1.0 - 0.5 * dropout)
}

/// Shared Idle/Running flag for the dropout scheduler
#[derive(Debug, Clone, Default)]
pub struct DropoutSwitch(Arc<AtomicBool>);

impl DropoutSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Envelope {
    Unity,
    Dip { remaining: u32, factor: f32, target: f32 },
    Recover { remaining: u32, factor: f32 },
}

pub struct VinylDamageProcessor {
    sample_rate: f32,
    channels: usize,
    dropout: f32,
    deterioration: f32,
    switch: DropoutSwitch,
    // Last observed switch state
    running: bool,
    frames_until_cycle: u64,
    gain: f32,
    envelope: Envelope,
    rng: SmallRng,
    dips: u64,
    destroyed: bool,
}

impl VinylDamageProcessor {
    pub fn new(context: &EngineContext, switch: DropoutSwitch, seed: u64) -> Self {
        Self {
            sample_rate: context.sample_rate_f32(),
            channels: context.channel_count(),
            dropout: 0.0,
            deterioration: 0.0,
            switch,
            running: false,
            frames_until_cycle: 0,
            gain: 1.0,
            envelope: Envelope::Unity,
            rng: SmallRng::seed_from_u64(seed),
            dips: 0,
            destroyed: false,
        }
    }

    pub fn switch(&self) -> &DropoutSwitch {
        &self.switch
    }

    /// Idle -> Running
    pub fn start(&self) {
        self.switch.start();
    }

    /// Running -> Idle; takes effect on the next processed frame
    pub fn stop(&self) {
        self.switch.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_dropout(&mut self, value: f32) {
        self.dropout = clamp_unit(value);
    }

    pub fn set_deterioration(&mut self, value: f32) {
        self.deterioration = clamp_unit(value);
    }

    pub fn dropout(&self) -> f32 {
        self.dropout
    }

    pub fn deterioration(&self) -> f32 {
        self.deterioration
    }

    /// Current gain of the damage stage
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Dips triggered since construction
    pub fn dips_triggered(&self) -> u64 {
        self.dips
    }

    fn cancel(&mut self) {
        self.running = false;
        self.frames_until_cycle = 0;
        self.envelope = Envelope::Unity;
        self.gain = 1.0;
    }

    fn secs_to_frames(&self, secs: f32) -> u32 {
        ((secs * self.sample_rate).round() as u32).max(1)
    }

    fn run_cycle(&mut self) {
        let depth = dropout_depth(self.dropout, self.deterioration, self.rng.gen::<f32>());

        if depth > DEPTH_THRESHOLD {
            let target = (1.0 - depth).max(MIN_GAIN);
            let steps = self.secs_to_frames(DIP_SECS);
            self.gain = 1.0;
            self.envelope = Envelope::Dip {
                remaining: steps,
                factor: target.powf(1.0 / steps as f32),
                target,
            };
            self.dips += 1;
        }

        let interval = next_interval_secs(self.dropout, self.rng.gen::<f32>());
        self.frames_until_cycle = ((interval * self.sample_rate).round() as u64).max(1);
    }

    #[inline]
    fn step_envelope(&mut self) {
        match self.envelope {
            Envelope::Unity => {}
            Envelope::Dip {
                remaining,
                factor,
                target,
            } => {
                if remaining <= 1 {
                    self.gain = target;
                    let steps = self.secs_to_frames(RECOVER_SECS);
                    self.envelope = Envelope::Recover {
                        remaining: steps,
                        factor: (1.0 / target).powf(1.0 / steps as f32),
                    };
                } else {
                    self.gain *= factor;
                    self.envelope = Envelope::Dip {
                        remaining: remaining - 1,
                        factor,
                        target,
                    };
                }
            }
            Envelope::Recover { remaining, factor } => {
                if remaining <= 1 {
                    self.gain = 1.0;
                    self.envelope = Envelope::Unity;
                } else {
                    self.gain = (self.gain * factor).min(1.0);
                    self.envelope = Envelope::Recover {
                        remaining: remaining - 1,
                        factor,
                    };
                }
            }
        }
    }
}

impl Stage for VinylDamageProcessor {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }

        let running = self.switch.is_running();
        if !running {
            if self.running || self.gain != 1.0 {
                self.cancel();
            }
            return;
        }
        if !self.running {
            // Idle -> Running: first cycle fires immediately
            self.running = true;
            self.frames_until_cycle = 0;
        }

        let channels = self.channels;
        for frame in samples.chunks_exact_mut(channels) {
            if self.frames_until_cycle == 0 {
                self.run_cycle();
            }
            self.frames_until_cycle -= 1;

            let gain = self.gain;
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
            self.step_envelope();
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match name {
            "dropout" => self.set_dropout(value),
            "deterioration" => self.set_deterioration(value),
            _ => ignore_parameter(self.name(), name),
        }
    }

    fn reset(&mut self) {
        self.cancel();
    }

    fn destroy(&mut self) {
        self.switch.stop();
        self.cancel();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "vinylDamage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn processor(sample_rate: u32) -> VinylDamageProcessor {
        VinylDamageProcessor::new(&EngineContext::new(sample_rate, 1), DropoutSwitch::new(), 42)
    }

    #[test]
    fn test_depth_formula() {
        assert_eq!(dropout_depth(0.0, 0.0, 0.0), 0.0);
        assert_relative_eq!(dropout_depth(1.0, 0.0, 0.5), 0.5);
        assert_relative_eq!(dropout_depth(0.0, 1.0, 0.05), 0.7);
        assert_relative_eq!(dropout_depth(0.0, 1.0, 0.5), 0.3);
        assert_relative_eq!(dropout_depth(1.0, 1.0, 0.0), 1.2);
    }

    #[test]
    fn test_interval_bounds() {
        for dropout in [0.0, 0.5, 1.0] {
            let factor = 1.0 - 0.5 * dropout;
            let lo = next_interval_secs(dropout, 0.0);
            let hi = next_interval_secs(dropout, 0.999_999);
            assert_relative_eq!(lo, 0.2 * factor);
            assert!(hi < 0.6 * factor + 1e-6);
        }
    }

    #[test]
    fn test_clean_record_never_dips() {
        let mut damage = processor(8000);
        damage.start();
        let mut block = vec![1.0f32; 8000 * 10];
        damage.process(&mut block);
        assert_eq!(damage.dips_triggered(), 0);
        assert!(block.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_idle_is_unity() {
        let mut damage = processor(8000);
        damage.set_dropout(1.0);
        damage.set_deterioration(1.0);
        let mut block = vec![0.5f32; 4000];
        damage.process(&mut block);
        assert_eq!(damage.dips_triggered(), 0);
        assert!(!damage.is_running());
        assert!(block.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_dip_reaches_target_and_recovers() {
        let mut damage = processor(10000);
        damage.set_dropout(1.0);
        damage.start();

        // First cycle fires on the first frame: depth >= 0.5
        let mut block = vec![1.0f32; 100];
        damage.process(&mut block);
        assert_eq!(damage.dips_triggered(), 1);
        assert!(block[0] == 1.0);
        let floor = block.iter().cloned().fold(f32::MAX, f32::min);
        assert!(floor < 0.51, "dip floor {}", floor);

        // 60 ms later the gain is back at unity
        let mut rest = vec![1.0f32; 1000];
        damage.process(&mut rest);
        assert_eq!(rest[999], 1.0);
    }

    #[test]
    fn test_dip_rate_follows_interval() {
        let sr = 8000;
        let mut damage = processor(sr);
        damage.set_dropout(1.0);
        damage.start();
        let secs = 30;
        let mut block = vec![1.0f32; sr as usize * secs];
        damage.process(&mut block);
        // Intervals are 0.1..0.3 s at full dropout
        let dips = damage.dips_triggered() as f32;
        assert!(dips >= secs as f32 / 0.3 - 2.0 && dips <= secs as f32 / 0.1 + 2.0, "{} dips", dips);
    }

    #[test]
    fn test_stop_cancels_mid_ramp() {
        let mut damage = processor(10000);
        damage.set_dropout(1.0);
        damage.start();
        let mut block = vec![1.0f32; 50];
        damage.process(&mut block);
        assert!(damage.gain() < 1.0);

        damage.stop();
        let mut after = vec![1.0f32; 2000];
        damage.process(&mut after);
        assert_eq!(damage.gain(), 1.0);
        assert!(!damage.is_running());
        assert!(after.iter().all(|&s| s == 1.0));
        assert_eq!(damage.dips_triggered(), 1);
    }

    #[test]
    fn test_switch_is_shared() {
        let switch = DropoutSwitch::new();
        let damage = VinylDamageProcessor::new(&EngineContext::default(), switch.clone(), 1);
        switch.start();
        assert!(damage.switch().is_running());
        damage.stop();
        assert!(!switch.is_running());
    }

    #[test]
    fn test_destroy_twice() {
        let mut damage = processor(8000);
        damage.start();
        damage.destroy();
        damage.destroy();
        assert!(damage.is_destroyed());
        assert!(!damage.switch().is_running());
    }
}
