//! Master bus - final glue compression and tone shaping
//!
//! Signal flow:
//! ```text
//! Input → Compressor → Tone filter → Output
//! ```
//!
//! Four discrete modes. Switching is a single transition: threshold, ratio
//! and tone all change together, never interpolated.

use std::fmt;
use std::str::FromStr;

use crate::dsp::{Biquad, BiquadCoeffs, BiquadKind, Compressor, CompressorSettings};
use crate::stage::{ignore_parameter, EngineContext, Stage};

const KNEE_DB: f32 = 10.0;
const ATTACK_SECS: f32 = 0.003;
const RELEASE_SECS: f32 = 0.25;

/// Tone filter shape for a mastering mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneShape {
    Flat,
    Peak { frequency: f32, q: f32, gain_db: f32 },
    HighShelf { frequency: f32, gain_db: f32 },
}

/// Fixed settings of one mastering mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteringConfig {
    pub threshold_db: f32,
    pub ratio: f32,
    pub tone: ToneShape,
}

/// Mastering presets for the master bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MasteringMode {
    /// Barely-there glue, flat tone
    #[default]
    Neutral,
    /// Firm compression, scooped 1 kHz
    Motown,
    /// Gentle compression, warm 800 Hz lift
    BlueNote,
    /// Gentle compression, airy top
    AbbeyRoad,
}

impl MasteringMode {
    pub const ALL: [MasteringMode; 4] = [
        MasteringMode::Neutral,
        MasteringMode::Motown,
        MasteringMode::BlueNote,
        MasteringMode::AbbeyRoad,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MasteringMode::Neutral => "neutral",
            MasteringMode::Motown => "motown",
            MasteringMode::BlueNote => "blueNote",
            MasteringMode::AbbeyRoad => "abbeyRoad",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub fn config(self) -> MasteringConfig {
        match self {
            MasteringMode::Neutral => MasteringConfig {
                threshold_db: -24.0,
                ratio: 1.1,
                tone: ToneShape::Flat,
            },
            MasteringMode::Motown => MasteringConfig {
                threshold_db: -22.0,
                ratio: 2.0,
                tone: ToneShape::Peak {
                    frequency: 1000.0,
                    q: 2.0,
                    gain_db: -3.0,
                },
            },
            MasteringMode::BlueNote => MasteringConfig {
                threshold_db: -22.5,
                ratio: 1.3,
                tone: ToneShape::Peak {
                    frequency: 800.0,
                    q: 1.5,
                    gain_db: 2.0,
                },
            },
            MasteringMode::AbbeyRoad => MasteringConfig {
                threshold_db: -22.5,
                ratio: 1.3,
                tone: ToneShape::HighShelf {
                    frequency: 3000.0,
                    gain_db: 1.0,
                },
            },
        }
    }
}

impl fmt::Display for MasteringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MasteringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown mastering mode '{}'", s))
    }
}

/// Compressor + tone filter at the end of the chain
pub struct MasterProcessor {
    mode: MasteringMode,
    compressor: Compressor,
    tone: Biquad,
    destroyed: bool,
}

impl MasterProcessor {
    pub fn new(context: &EngineContext) -> Self {
        let sr = context.sample_rate_f32();
        let ch = context.channel_count();
        let config = MasteringMode::Neutral.config();
        let mut master = Self {
            mode: MasteringMode::Neutral,
            compressor: Compressor::new(sr, ch, Self::compressor_settings(&config)),
            tone: Biquad::new(BiquadKind::Peaking, sr, ch, 1000.0, 1.0, 0.0),
            destroyed: false,
        };
        master.set_mode(MasteringMode::Neutral);
        master
    }

    fn compressor_settings(config: &MasteringConfig) -> CompressorSettings {
        CompressorSettings {
            threshold_db: config.threshold_db,
            knee_db: KNEE_DB,
            ratio: config.ratio,
            attack_secs: ATTACK_SECS,
            release_secs: RELEASE_SECS,
        }
    }

    /// Switch mode; compressor and tone change in one step
    pub fn set_mode(&mut self, mode: MasteringMode) {
        let config = mode.config();
        self.compressor.apply(Self::compressor_settings(&config));
        match config.tone {
            ToneShape::Flat => self.tone.configure(BiquadKind::Peaking, 1000.0, 1.0, 0.0),
            ToneShape::Peak { frequency, q, gain_db } => {
                self.tone.configure(BiquadKind::Peaking, frequency, q, gain_db)
            }
            ToneShape::HighShelf { frequency, gain_db } => {
                self.tone.configure(BiquadKind::HighShelf, frequency, 1.0, gain_db)
            }
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> MasteringMode {
        self.mode
    }

    pub fn compressor(&self) -> CompressorSettings {
        self.compressor.settings()
    }

    pub fn tone_coeffs(&self) -> BiquadCoeffs {
        self.tone.coeffs()
    }
}

impl Stage for MasterProcessor {
    fn process(&mut self, samples: &mut [f32]) {
        if self.destroyed {
            samples.fill(0.0);
            return;
        }
        self.compressor.process_interleaved(samples);
        self.tone.process_interleaved(samples);
    }

    fn set_parameter(&mut self, name: &str, _value: f32) {
        ignore_parameter(self.name(), name);
    }

    fn reset(&mut self) {
        self.compressor.reset();
        self.tone.reset();
    }

    fn destroy(&mut self) {
        self.reset();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn name(&self) -> &'static str {
        "master"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in MasteringMode::ALL {
            assert_eq!(mode.name().parse::<MasteringMode>(), Ok(mode));
        }
        assert_eq!(MasteringMode::from_name("bluenote"), Some(MasteringMode::BlueNote));
        assert!("loud".parse::<MasteringMode>().is_err());
    }

    #[test]
    fn test_preset_table() {
        let mut master = MasterProcessor::new(&EngineContext::default());
        assert!(master.tone_coeffs().is_identity());
        assert_eq!(master.compressor().threshold_db, -24.0);
        assert_eq!(master.compressor().ratio, 1.1);

        master.set_mode(MasteringMode::Motown);
        assert_eq!(master.compressor().threshold_db, -22.0);
        assert_eq!(master.compressor().ratio, 2.0);
        assert_eq!(master.tone.kind(), BiquadKind::Peaking);
        assert_eq!(master.tone.gain_db(), -3.0);

        master.set_mode(MasteringMode::AbbeyRoad);
        assert_eq!(master.tone.kind(), BiquadKind::HighShelf);
        assert_eq!(master.tone.frequency(), 3000.0);
        assert_eq!(master.compressor().ratio, 1.3);
    }

    #[test]
    fn test_fixed_dynamics_constants() {
        let mut master = MasterProcessor::new(&EngineContext::default());
        for mode in MasteringMode::ALL {
            master.set_mode(mode);
            let c = master.compressor();
            assert_eq!(c.knee_db, 10.0);
            assert_eq!(c.attack_secs, 0.003);
            assert_eq!(c.release_secs, 0.25);
        }
    }

    #[test]
    fn test_switch_is_idempotent() {
        let mut once = MasterProcessor::new(&EngineContext::default());
        once.set_mode(MasteringMode::Motown);

        let mut twice = MasterProcessor::new(&EngineContext::default());
        twice.set_mode(MasteringMode::BlueNote);
        twice.set_mode(MasteringMode::Motown);
        twice.set_mode(MasteringMode::Motown);

        assert_eq!(once.tone_coeffs(), twice.tone_coeffs());
        assert_eq!(once.compressor(), twice.compressor());
        assert_eq!(once.mode(), twice.mode());
    }

    #[test]
    fn test_every_mode_parses_by_name() {
        for mode in MasteringMode::ALL {
            assert_eq!(mode.name().parse::<MasteringMode>(), Ok(mode));
            assert_eq!(mode.to_string(), mode.name());
        }
        assert_eq!("BLUENOTE".parse::<MasteringMode>(), Ok(MasteringMode::BlueNote));
        assert!("loud".parse::<MasteringMode>().is_err());
    }
}
