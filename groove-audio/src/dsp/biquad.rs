//! Second-order filter sections
//!
//! Coefficients follow the RBJ Audio EQ Cookbook with the conventions of
//! browser audio graphs: shelves use a fixed slope of 1, peaking and
//! allpass use `alpha = sin(w0) / (2Q)`, and the highpass Q is a resonance
//! in dB. All formulas are total: frequencies at or beyond the band edges
//! collapse to the limiting response instead of producing NaN.

use std::f32::consts::PI;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    LowShelf,
    HighShelf,
    Peaking,
    Highpass,
    Allpass,
}

/// Normalized coefficients (a0 folded in)
///
/// `a*` are feed-forward, `b*` feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
    pub b1: f32,
    pub b2: f32,
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    };

    /// Plain gain, no memory
    fn gain(g: f32) -> Self {
        Self {
            a0: g,
            ..Self::IDENTITY
        }
    }

    fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self {
            a0: b0 * inv,
            a1: b1 * inv,
            a2: b2 * inv,
            b1: a1 * inv,
            b2: a2 * inv,
        }
    }

    /// Design coefficients for `kind`.
    pub fn design(kind: BiquadKind, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let nyquist = 0.5 * sample_rate;
        let normalized = if frequency.is_nan() {
            0.0
        } else {
            (frequency / nyquist).clamp(0.0, 1.0)
        };
        let gain_db = if gain_db.is_finite() { gain_db } else { 0.0 };
        let a = 10.0f32.powf(gain_db / 40.0);

        match kind {
            BiquadKind::LowShelf => {
                if gain_db == 0.0 {
                    return Self::IDENTITY;
                }
                if normalized >= 1.0 {
                    return Self::gain(a * a);
                }
                if normalized <= 0.0 {
                    return Self::IDENTITY;
                }
                Self::shelf(normalized, a, false)
            }
            BiquadKind::HighShelf => {
                if gain_db == 0.0 {
                    return Self::IDENTITY;
                }
                if normalized >= 1.0 {
                    return Self::IDENTITY;
                }
                if normalized <= 0.0 {
                    return Self::gain(a * a);
                }
                Self::shelf(normalized, a, true)
            }
            BiquadKind::Peaking => {
                if gain_db == 0.0 || normalized <= 0.0 || normalized >= 1.0 {
                    return Self::IDENTITY;
                }
                if q <= 0.0 || !q.is_finite() {
                    return Self::gain(a * a);
                }
                let w0 = PI * normalized;
                let alpha = w0.sin() / (2.0 * q);
                let cos_w0 = w0.cos();
                Self::normalize(
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            BiquadKind::Highpass => {
                if normalized >= 1.0 {
                    return Self::gain(0.0);
                }
                if normalized <= 0.0 {
                    return Self::IDENTITY;
                }
                let w0 = PI * normalized;
                let resonance = 10.0f32.powf(q.clamp(-770.0, 770.0) / 20.0);
                let alpha = w0.sin() / (2.0 * resonance);
                let cos_w0 = w0.cos();
                Self::normalize(
                    (1.0 + cos_w0) / 2.0,
                    -(1.0 + cos_w0),
                    (1.0 + cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            BiquadKind::Allpass => {
                if normalized <= 0.0 || normalized >= 1.0 {
                    return Self::IDENTITY;
                }
                if q <= 0.0 || !q.is_finite() {
                    return Self::gain(-1.0);
                }
                let w0 = PI * normalized;
                let alpha = w0.sin() / (2.0 * q);
                let cos_w0 = w0.cos();
                Self::normalize(
                    1.0 - alpha,
                    -2.0 * cos_w0,
                    1.0 + alpha,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
        }
    }

    fn shelf(normalized: f32, a: f32, high: bool) -> Self {
        let w0 = PI * normalized;
        let cos_w0 = w0.cos();
        // S = 1
        let alpha = 0.5 * w0.sin() * 2.0f32.sqrt();
        let k = 2.0 * a.sqrt() * alpha;
        let ap1 = a + 1.0;
        let am1 = a - 1.0;

        if high {
            Self::normalize(
                a * (ap1 + am1 * cos_w0 + k),
                -2.0 * a * (am1 + ap1 * cos_w0),
                a * (ap1 + am1 * cos_w0 - k),
                ap1 - am1 * cos_w0 + k,
                2.0 * (am1 - ap1 * cos_w0),
                ap1 - am1 * cos_w0 - k,
            )
        } else {
            Self::normalize(
                a * (ap1 - am1 * cos_w0 + k),
                2.0 * a * (am1 - ap1 * cos_w0),
                a * (ap1 - am1 * cos_w0 - k),
                ap1 + am1 * cos_w0 + k,
                -2.0 * (am1 + ap1 * cos_w0),
                ap1 + am1 * cos_w0 - k,
            )
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Magnitude response at `frequency`, for tests and metering
    pub fn magnitude_at(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.a0 + self.a1 * c1 + self.a2 * c2;
        let num_im = -(self.a1 * s1 + self.a2 * s2);
        let den_re = 1.0 + self.b1 * c1 + self.b2 * c2;
        let den_im = -(self.b1 * s1 + self.b2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct form I memory for one channel
#[derive(Debug, Default, Clone, Copy)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.a0 * input + coeffs.a1 * self.x1 + coeffs.a2 * self.x2
            - coeffs.b1 * self.y1
            - coeffs.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        // Flush denormals
        self.y1 = if output.abs() < 1.0e-20 { 0.0 } else { output };

        output
    }
}

/// A biquad section with per-channel state and its design parameters
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BiquadKind,
    sample_rate: f32,
    frequency: f32,
    q: f32,
    gain_db: f32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl Biquad {
    pub fn new(kind: BiquadKind, sample_rate: f32, channels: usize, frequency: f32, q: f32, gain_db: f32) -> Self {
        let mut filter = Self {
            kind,
            sample_rate,
            frequency,
            q,
            gain_db,
            coeffs: BiquadCoeffs::IDENTITY,
            states: vec![BiquadState::default(); channels.max(1)],
        };
        filter.update();
        filter
    }

    fn update(&mut self) {
        self.coeffs = BiquadCoeffs::design(self.kind, self.sample_rate, self.frequency, self.q, self.gain_db);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.update();
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
        self.update();
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
        self.update();
    }

    /// Change every design value with a single coefficient update
    pub fn configure(&mut self, kind: BiquadKind, frequency: f32, q: f32, gain_db: f32) {
        self.kind = kind;
        self.frequency = frequency;
        self.q = q;
        self.gain_db = gain_db;
        self.update();
    }

    pub fn kind(&self) -> BiquadKind {
        self.kind
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        match self.states.get_mut(channel) {
            Some(state) => state.process(input, &self.coeffs),
            None => input,
        }
    }

    /// Filter an interleaved block in place
    pub fn process_interleaved(&mut self, samples: &mut [f32]) {
        if self.coeffs.is_identity() {
            return;
        }
        let channels = self.states.len();
        for frame in samples.chunks_exact_mut(channels) {
            for (state, sample) in self.states.iter_mut().zip(frame.iter_mut()) {
                *sample = state.process(*sample, &self.coeffs);
            }
        }
    }

    pub fn reset(&mut self) {
        self.states.iter_mut().for_each(|s| *s = BiquadState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f32 = 44100.0;

    fn db(x: f32) -> f32 {
        20.0 * x.log10()
    }

    #[test]
    fn test_zero_gain_is_identity() {
        for kind in [BiquadKind::LowShelf, BiquadKind::HighShelf, BiquadKind::Peaking] {
            assert!(BiquadCoeffs::design(kind, SR, 1000.0, 1.0, 0.0).is_identity());
        }
    }

    #[test]
    fn test_peaking_gain_at_center() {
        let c = BiquadCoeffs::design(BiquadKind::Peaking, SR, 1000.0, 2.0, -3.0);
        assert_relative_eq!(db(c.magnitude_at(1000.0, SR)), -3.0, epsilon = 0.01);
        assert_relative_eq!(db(c.magnitude_at(50.0, SR)), 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_shelves_reach_full_gain() {
        let low = BiquadCoeffs::design(BiquadKind::LowShelf, SR, 500.0, 1.0, 6.0);
        assert_relative_eq!(db(low.magnitude_at(10.0, SR)), 6.0, epsilon = 0.05);
        assert_relative_eq!(db(low.magnitude_at(18000.0, SR)), 0.0, epsilon = 0.1);

        let high = BiquadCoeffs::design(BiquadKind::HighShelf, SR, 3000.0, 1.0, -12.0);
        assert_relative_eq!(db(high.magnitude_at(20000.0, SR)), -12.0, epsilon = 0.2);
        assert_relative_eq!(db(high.magnitude_at(20.0, SR)), 0.0, epsilon = 0.05);
        // Half gain at the corner
        assert_relative_eq!(db(high.magnitude_at(3000.0, SR)), -6.0, epsilon = 0.1);
    }

    #[test]
    fn test_allpass_is_flat() {
        let c = BiquadCoeffs::design(BiquadKind::Allpass, SR, 750.0, 1.0, 0.0);
        for f in [50.0, 750.0, 5000.0, 15000.0] {
            assert_relative_eq!(c.magnitude_at(f, SR), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let c = BiquadCoeffs::design(BiquadKind::Highpass, SR, 380.0, 1.0, 0.0);
        assert!(c.magnitude_at(5.0, SR) < 0.01);
        assert_relative_eq!(c.magnitude_at(15000.0, SR), 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_edge_frequencies_are_total() {
        for kind in [
            BiquadKind::LowShelf,
            BiquadKind::HighShelf,
            BiquadKind::Peaking,
            BiquadKind::Highpass,
            BiquadKind::Allpass,
        ] {
            for f in [-10.0, 0.0, 22050.0, 30000.0, f32::NAN] {
                let c = BiquadCoeffs::design(kind, SR, f, 4.5, 12.0);
                assert!(c.a0.is_finite() && c.b1.is_finite() && c.b2.is_finite());
            }
        }
    }

    #[test]
    fn test_process_interleaved_stereo_independent() {
        let mut f = Biquad::new(BiquadKind::Highpass, SR, 2, 1000.0, 0.0, 0.0);
        let mut block = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        f.process_interleaved(&mut block);
        assert!(block[0] != 0.0);
        assert_eq!(block[1], 0.0);
        assert_eq!(block[3], 0.0);
    }
}
