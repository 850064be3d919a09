//! Vinyl playback engine for Groove
//!
//! A decoded track runs through a fixed cascade of stages that recreate
//! the sound of a record:
//! - Vinyl: RIAA curve, aging, stylus wear, echo, dynamics, dropouts, crackle
//! - Mastering: final compression and tone shaping
//! - Engine: live transport and parameter control
//! - Render: offline bounce to 16-bit WAV

pub mod dsp;
mod buffer;
mod engine;
mod graph;
mod mastering;
mod params;
mod path;
pub mod presets;
mod render;
mod source;
mod stage;
mod transport;
pub mod vinyl;
pub mod wav;

pub use buffer::AudioBuffer;
pub use engine::{Engine, EngineError, TransportState, DEFAULT_RENDER_SEED};
pub use graph::{vinyl_chain, ChainIds, ChainStage, Output, StageGraph, StageId};
pub use mastering::{MasterProcessor, MasteringConfig, MasteringMode, ToneShape};
pub use params::{clamp_param, clamp_unit, EffectParameters, ParamId, ParameterBank};
pub use path::{PathCommand, PathEvent, PositionCell, SignalPath};
pub use presets::Preset;
pub use render::{pitch_ratio, OfflineRenderer, RenderJob, RenderMode, RenderPlan, PADDING_SECS, PITCH_RANGE};
pub use source::{extension_hint, AssetLoadError, AssetSource, AudioDecoder, DecodeError};
pub use stage::{EngineContext, Stage, RENDER_QUANTUM};
pub use transport::{PlaybackState, Transport};
pub use vinyl::{
    crackle_rate, AgeFilter, CrackleProcessor, DropoutSwitch, GhostEcho, InnerGrooveDistortion, NoiseBank,
    PinchEffect, RiaaEmphasis, SpindleEccentricity, StereoBalance, StylusResonance, VinylDamageProcessor, WornStylus,
};
pub use wav::{encode_pcm16, WavError};
