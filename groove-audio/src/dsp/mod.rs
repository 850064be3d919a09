//! DSP building blocks shared by the stages

mod biquad;
mod compressor;
mod lfo;

pub use biquad::{Biquad, BiquadCoeffs, BiquadKind};
pub use compressor::{db_to_linear, linear_to_db, Compressor, CompressorSettings};
pub use lfo::Lfo;
