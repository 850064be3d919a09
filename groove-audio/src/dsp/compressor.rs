//! Feed-forward dynamics compressor
//!
//! Soft-knee gain computer with linked peak detection across channels and
//! separate attack/release smoothing of the gain. Makeup gain is derived
//! from the curve itself (0.6 power of the inverse full-scale gain), so
//! ratio 1 is unity and heavier settings come back up towards 0 dBFS.

/// Convert dB to linear
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert linear to dB
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 1e-10 {
        20.0 * linear.log10()
    } else {
        -200.0
    }
}

/// Snapshot of compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

pub struct Compressor {
    sample_rate: f32,
    channels: usize,

    threshold: f32,
    knee: f32,
    ratio: f32,
    attack: f32,
    release: f32,

    attack_coeff: f32,
    release_coeff: f32,
    makeup_gain: f32,

    // Smoothed linear gain
    envelope: f32,
    current_gr_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32, channels: usize, settings: CompressorSettings) -> Self {
        let mut comp = Self {
            sample_rate,
            channels: channels.max(1),
            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup_gain: 1.0,
            envelope: 1.0,
            current_gr_db: 0.0,
        };
        comp.apply(settings);
        comp
    }

    /// Apply all settings with one coefficient update
    pub fn apply(&mut self, settings: CompressorSettings) {
        self.threshold = clamp_or(settings.threshold_db, -100.0, 0.0, -24.0);
        self.knee = clamp_or(settings.knee_db, 0.0, 40.0, 30.0);
        self.ratio = clamp_or(settings.ratio, 1.0, 20.0, 1.0);
        self.attack = clamp_or(settings.attack_secs, 0.0, 1.0, 0.003);
        self.release = clamp_or(settings.release_secs, 0.0, 1.0, 0.25);
        self.update_coefficients();
        self.calculate_makeup_gain();
    }

    pub fn set_threshold(&mut self, db: f32) {
        self.apply(CompressorSettings {
            threshold_db: db,
            ..self.settings()
        });
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.apply(CompressorSettings {
            ratio,
            ..self.settings()
        });
    }

    pub fn settings(&self) -> CompressorSettings {
        CompressorSettings {
            threshold_db: self.threshold,
            knee_db: self.knee,
            ratio: self.ratio,
            attack_secs: self.attack,
            release_secs: self.release,
        }
    }

    pub fn makeup_gain(&self) -> f32 {
        self.makeup_gain
    }

    /// Current gain reduction in dB (negative when compressing)
    pub fn gain_reduction_db(&self) -> f32 {
        self.current_gr_db
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_coeff(self.sample_rate, self.attack);
        self.release_coeff = time_coeff(self.sample_rate, self.release);
    }

    fn calculate_makeup_gain(&mut self) {
        let full_range_db = self.compute_gain_reduction(0.0);
        self.makeup_gain = db_to_linear(-full_range_db * 0.6);
    }

    /// Static curve: gain change in dB for a detector level in dB
    #[inline]
    pub fn compute_gain_reduction(&self, input_db: f32) -> f32 {
        let threshold = self.threshold;
        let ratio = self.ratio;
        let knee = self.knee;

        if input_db < threshold - knee / 2.0 {
            0.0
        } else if input_db > threshold + knee / 2.0 || knee <= 0.0 {
            threshold + (input_db - threshold) / ratio - input_db
        } else {
            let x = input_db - (threshold - knee / 2.0);
            (1.0 / ratio - 1.0) * (x * x) / (2.0 * knee)
        }
    }

    /// Compress an interleaved block in place
    pub fn process_interleaved(&mut self, samples: &mut [f32]) {
        let channels = self.channels;
        for frame in samples.chunks_exact_mut(channels) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let gr_db = self.compute_gain_reduction(linear_to_db(peak));
            let target_gain = db_to_linear(gr_db);

            let coeff = if target_gain < self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target_gain;
            self.current_gr_db = linear_to_db(self.envelope);

            let gain = self.envelope * self.makeup_gain;
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 1.0;
        self.current_gr_db = 0.0;
    }
}

#[inline]
fn time_coeff(sample_rate: f32, secs: f32) -> f32 {
    if secs <= 0.0 {
        0.0
    } else {
        (-1.0 / (sample_rate * secs)).exp()
    }
}

#[inline]
fn clamp_or(value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings(threshold_db: f32, ratio: f32) -> CompressorSettings {
        CompressorSettings {
            threshold_db,
            knee_db: 10.0,
            ratio,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }

    #[test]
    fn test_unity_ratio_is_transparent() {
        let mut comp = Compressor::new(48000.0, 2, settings(-24.0, 1.0));
        assert_relative_eq!(comp.makeup_gain(), 1.0);
        let mut samples = vec![0.9; 512];
        comp.process_interleaved(&mut samples);
        assert!(samples.iter().all(|&s| (s - 0.9).abs() < 1e-5));
    }

    #[test]
    fn test_loud_signal_compression() {
        let mut comp = Compressor::new(48000.0, 2, settings(-20.0, 4.0));
        let mut samples = vec![0.9; 4000];
        comp.process_interleaved(&mut samples);
        let gr = comp.gain_reduction_db();
        assert!(gr < -3.0, "Expected gain reduction, got {} dB", gr);
    }

    #[test]
    fn test_quiet_signal_untouched_by_curve() {
        let comp = Compressor::new(48000.0, 2, settings(-24.0, 2.0));
        assert_eq!(comp.compute_gain_reduction(-60.0), 0.0);
    }

    #[test]
    fn test_knee_is_continuous() {
        let comp = Compressor::new(48000.0, 1, settings(-22.0, 2.0));
        let upper = -22.0 + 5.0;
        let inside = comp.compute_gain_reduction(upper - 1e-3);
        let outside = comp.compute_gain_reduction(upper + 1e-3);
        assert_relative_eq!(inside, outside, epsilon = 1e-2);
    }

    #[test]
    fn test_makeup_follows_curve() {
        // ratio 1.1 at -24 dB: 0 dBFS maps to about -2.18 dB
        let comp = Compressor::new(44100.0, 2, settings(-24.0, 1.1));
        assert_relative_eq!(linear_to_db(comp.makeup_gain()), 2.182 * 0.6, epsilon = 0.01);
    }

    #[test]
    fn test_parameter_clamping() {
        let comp = Compressor::new(
            48000.0,
            2,
            CompressorSettings {
                threshold_db: -150.0,
                knee_db: 80.0,
                ratio: 0.5,
                attack_secs: 3.0,
                release_secs: f32::NAN,
            },
        );
        let s = comp.settings();
        assert_eq!(s.threshold_db, -100.0);
        assert_eq!(s.knee_db, 40.0);
        assert_eq!(s.ratio, 1.0);
        assert_eq!(s.attack_secs, 1.0);
        assert_eq!(s.release_secs, 0.25);
    }
}
