//! Contract shared by every processing stage in the chain

use tracing::debug;

/// Frames per render quantum. Modulated coefficients update once per quantum.
pub const RENDER_QUANTUM: usize = 128;

/// Explicitly constructed audio context passed to every stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineContext {
    pub sample_rate: u32,
    pub channels: u16,
}

impl EngineContext {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    #[inline]
    pub fn sample_rate_f32(&self) -> f32 {
        self.sample_rate as f32
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels as usize
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(44100, 2)
    }
}

/// A DSP unit in the fixed chain.
///
/// Stages process interleaved blocks of at most `RENDER_QUANTUM` frames.
/// `set_parameter` never fails: values are clamped and unknown names are
/// ignored. `destroy` is idempotent; a destroyed stage outputs silence.
pub trait Stage: Send {
    /// Process interleaved samples in place
    fn process(&mut self, samples: &mut [f32]);

    /// Update a named parameter and recompute coefficients
    fn set_parameter(&mut self, name: &str, value: f32);

    /// Clear filter memory and modulator phase
    fn reset(&mut self);

    /// Stop internal modulators and release state
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Log a parameter name a stage does not own
#[inline]
pub(crate) fn ignore_parameter(stage: &'static str, name: &str) {
    debug!(stage, parameter = name, "parameter ignored");
}
