//! Vinyl stages
//!
//! The coloration stages of the fixed chain, plus the dropout scheduler
//! and the surface-noise player:
//! - StereoBalance: head of the chain (pass-through)
//! - VinylDamage: scheduled amplitude dropouts
//! - RIAA, Age, WornStylus, StylusResonance: static and slowly modulated EQ
//! - GhostEcho: adjacent-groove pre/post echo
//! - Pinch, InnerGroove: dynamics and soft clipping
//! - Spindle: playback-rate wobble fed to the transport
//! - Crackle: looping noise mixed in front of the master bus

mod age;
mod crackle;
mod damage;
mod ghost_echo;
mod inner_groove;
mod pinch;
mod riaa;
mod spindle;
mod stereo_balance;
mod stylus;
mod worn_stylus;

pub use age::AgeFilter;
pub use crackle::{crackle_rate, CrackleProcessor, NoiseBank, PITCH_TRACKING};
pub use damage::{dropout_depth, next_interval_secs, DropoutSwitch, VinylDamageProcessor, DEPTH_THRESHOLD, MIN_GAIN};
pub use ghost_echo::GhostEcho;
pub use inner_groove::{shape as inner_groove_curve, InnerGrooveDistortion};
pub use pinch::PinchEffect;
pub use riaa::RiaaEmphasis;
pub use spindle::SpindleEccentricity;
pub use stereo_balance::StereoBalance;
pub use stylus::StylusResonance;
pub use worn_stylus::WornStylus;
