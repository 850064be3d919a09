//! Engine - control-side owner of the session
//!
//! Communication with the signal path happens through lock-free channels:
//! - Commands: control thread → audio thread (transport, mastering, crackle)
//! - Events: audio thread → control thread (end of track)
//!
//! Parameters bypass the channel: they go through the shared
//! `ParameterBank` and the audio side picks up whatever changed.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::AudioBuffer;
use crate::mastering::MasteringMode;
use crate::params::{EffectParameters, ParamId, ParameterBank};
use crate::path::{PathCommand, PathEvent, PositionCell, SignalPath};
use crate::presets;
use crate::render::{pitch_ratio, OfflineRenderer, RenderJob, RenderMode, PITCH_RANGE};
use crate::source::{AssetLoadError, AssetSource, AudioDecoder, DecodeError};
use crate::stage::EngineContext;
use crate::vinyl::{DropoutSwitch, NoiseBank};
use crate::wav::WavError;

const COMMAND_CAPACITY: usize = 1024;
const EVENT_CAPACITY: usize = 64;
const SUBSCRIBER_CAPACITY: usize = 64;

/// Seed used for offline renders unless overridden
pub const DEFAULT_RENDER_SEED: u64 = 0x5EED;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode audio: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to load noise asset: {0}")]
    AssetLoad(#[from] AssetLoadError),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("failed to encode export: {0}")]
    Encode(#[from] WavError),

    #[error("engine has been destroyed")]
    Destroyed,
}

/// Snapshot of transport state sent to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_time_secs: f64,
    pub duration_secs: f64,
    pub pitch_semitones: f32,
}

pub struct Engine {
    context: EngineContext,
    params: Arc<ParameterBank>,
    commands: Sender<PathCommand>,
    events: Receiver<PathEvent>,
    position: Arc<PositionCell>,
    dropout: DropoutSwitch,
    decoder: Arc<dyn AudioDecoder>,
    noise: NoiseBank,
    buffer: Option<Arc<AudioBuffer>>,
    crackle_file: Option<String>,
    mastering: MasteringMode,
    pitch_semitones: f32,
    is_playing: bool,
    is_paused: bool,
    pause_offset: f64,
    run: u64,
    render_mode: RenderMode,
    render_seed: u64,
    subscribers: Vec<Sender<TransportState>>,
    destroyed: bool,
}

impl Engine {
    /// Create an engine and the signal path it drives.
    ///
    /// The path belongs in the audio callback; the engine stays on the
    /// control thread.
    pub fn new(
        context: EngineContext,
        decoder: Arc<dyn AudioDecoder>,
        assets: Arc<dyn AssetSource>,
    ) -> (Self, SignalPath) {
        let params = Arc::new(ParameterBank::default());
        let (cmd_tx, cmd_rx) = bounded(COMMAND_CAPACITY);
        let (evt_tx, evt_rx) = bounded(EVENT_CAPACITY);

        let mut path = SignalPath::new(context, Arc::clone(&params), rand::random());
        path.connect_control(cmd_rx, evt_tx);

        let engine = Self {
            context,
            params,
            commands: cmd_tx,
            events: evt_rx,
            position: path.position_cell(),
            dropout: path.dropout_switch(),
            decoder: Arc::clone(&decoder),
            noise: NoiseBank::new(assets, decoder),
            buffer: None,
            crackle_file: None,
            mastering: MasteringMode::default(),
            pitch_semitones: 0.0,
            is_playing: false,
            is_paused: false,
            pause_offset: 0.0,
            run: 0,
            render_mode: RenderMode::default(),
            render_seed: DEFAULT_RENDER_SEED,
            subscribers: Vec::new(),
            destroyed: false,
        };

        info!(
            sample_rate = context.sample_rate,
            channels = context.channels,
            "engine created"
        );
        (engine, path)
    }

    pub fn context(&self) -> EngineContext {
        self.context
    }

    fn send(&self, cmd: PathCommand) {
        match self.commands.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => warn!(?cmd, "command queue full, dropping"),
            Err(TrySendError::Disconnected(_)) => debug!("signal path gone"),
        }
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.destroyed {
            Err(EngineError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let state = self.state();
        self.subscribers.retain(|tx| !matches!(tx.try_send(state), Err(TrySendError::Disconnected(_))));
    }

    /// Receive a state snapshot after every transport change
    pub fn subscribe(&mut self) -> Receiver<TransportState> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    // ==================== Loading ====================

    /// Decode `bytes` and make them the session buffer.
    ///
    /// On a decode failure nothing changes, playback included.
    pub fn load_audio_file(&mut self, bytes: &[u8], hint: Option<&str>) -> Result<TransportState, EngineError> {
        self.ensure_alive()?;
        let decoded = self.decoder.decode(bytes, hint)?;
        debug!(
            frames = decoded.frames(),
            channels = decoded.channels(),
            sample_rate = decoded.sample_rate(),
            "decoded input"
        );
        self.load_buffer(decoded)
    }

    /// Replace the session buffer with already decoded audio
    pub fn load_buffer(&mut self, buffer: AudioBuffer) -> Result<TransportState, EngineError> {
        self.ensure_alive()?;
        self.halt(false);

        let buffer = Arc::new(buffer);
        info!(duration = buffer.duration_secs(), "audio loaded");
        self.send(PathCommand::Load(Arc::clone(&buffer)));
        self.buffer = Some(buffer);
        self.position.store(0.0);
        self.notify();
        Ok(self.state())
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Load a crackle asset and make it the selected noise loop
    pub fn load_crackle(&mut self, name: &str) -> Result<(), EngineError> {
        self.ensure_alive()?;
        let buffer = self.noise.load(name)?;
        self.crackle_file = Some(name.to_string());
        if self.is_playing {
            self.start_crackle(buffer);
        }
        Ok(())
    }

    pub fn crackle_file(&self) -> Option<&str> {
        self.crackle_file.as_deref()
    }

    fn start_crackle(&self, buffer: Arc<AudioBuffer>) {
        self.send(PathCommand::StartCrackle {
            buffer,
            intensity: self.params.load(ParamId::Crackle),
            pitch_ratio: self.playback_rate(),
        });
    }

    // ==================== Transport ====================

    /// Start playback, resuming from the pause point if paused
    pub fn play(&mut self) -> Result<(), EngineError> {
        self.ensure_alive()?;
        if self.buffer.is_none() {
            return Err(EngineError::InvalidState("no audio loaded"));
        }
        if self.is_playing {
            return Ok(());
        }

        let offset = if self.is_paused { self.pause_offset } else { 0.0 };
        let rate = self.playback_rate();
        self.run = self.run.wrapping_add(1);
        self.send(PathCommand::Start {
            run: self.run,
            offset_secs: offset,
            rate,
        });
        self.dropout.start();
        if let Some(noise) = self.crackle_file.as_deref().and_then(|name| self.noise.get(name)) {
            self.start_crackle(noise);
        }

        self.position.store(offset);
        self.is_playing = true;
        self.is_paused = false;
        info!(offset, rate, "play");
        self.notify();
        Ok(())
    }

    /// Stop the transport and remember where it was
    pub fn pause(&mut self) {
        if self.destroyed || !self.is_playing {
            return;
        }
        let offset = self.position.load();
        self.halt(true);
        self.pause_offset = offset;
        info!(offset, "pause");
        self.notify();
    }

    /// Stop the transport and rewind
    pub fn stop(&mut self) {
        if self.destroyed {
            return;
        }
        self.halt(false);
        info!("stop");
        self.notify();
    }

    fn halt(&mut self, paused: bool) {
        self.send(PathCommand::Stop);
        self.send(PathCommand::StopCrackle);
        self.dropout.stop();
        self.is_playing = false;
        self.is_paused = paused;
        self.pause_offset = 0.0;
        if !paused {
            self.position.store(0.0);
        }
    }

    /// Shift pitch in semitones, clamped to ±12. Applies live while playing.
    pub fn set_pitch(&mut self, semitones: f32) {
        if self.destroyed {
            return;
        }
        if !semitones.is_finite() {
            debug!(semitones, "ignoring non-finite pitch");
            return;
        }
        let (lo, hi) = PITCH_RANGE;
        self.pitch_semitones = semitones.clamp(lo, hi);
        if self.is_playing {
            self.send(PathCommand::SetRate(self.playback_rate()));
        }
        self.notify();
    }

    pub fn pitch(&self) -> f32 {
        self.pitch_semitones
    }

    /// Current pitch ratio, 2^(semitones/12)
    pub fn playback_rate(&self) -> f64 {
        pitch_ratio(self.pitch_semitones)
    }

    /// Handle events from the signal path. Returns true if the track ended.
    pub fn poll(&mut self) -> bool {
        let mut ended = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                PathEvent::Ended { run } if run == self.run => ended = true,
                PathEvent::Ended { run } => debug!(run, current = self.run, "ignoring end of an earlier run"),
            }
        }
        if ended && self.is_playing {
            info!("end of track");
            self.stop();
        }
        ended
    }

    pub fn state(&self) -> TransportState {
        let current_time_secs = if self.is_playing {
            self.position.load()
        } else if self.is_paused {
            self.pause_offset
        } else {
            0.0
        };
        TransportState {
            is_playing: self.is_playing,
            is_paused: self.is_paused,
            current_time_secs,
            duration_secs: self.buffer.as_ref().map_or(0.0, |b| b.duration_secs()),
            pitch_semitones: self.pitch_semitones,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    // ==================== Parameters ====================

    /// Set a parameter by wire name. Unknown names are ignored.
    pub fn update_effect(&mut self, name: &str, value: f32) {
        match ParamId::from_name(name) {
            Some(id) => {
                self.set_parameter(id, value);
            }
            None => debug!(name, "ignoring unknown parameter"),
        }
    }

    /// Store a clamped value for the signal path to pick up; returns it
    pub fn set_parameter(&mut self, id: ParamId, value: f32) -> f32 {
        self.params.store(id, value)
    }

    pub fn parameters(&self) -> EffectParameters {
        self.params.snapshot()
    }

    pub fn set_mastering_mode(&mut self, mode: MasteringMode) {
        if self.destroyed {
            return;
        }
        self.mastering = mode;
        self.send(PathCommand::SetMastering(mode));
        info!(%mode, "mastering mode");
    }

    pub fn mastering_mode(&self) -> MasteringMode {
        self.mastering
    }

    /// Apply a preset's twelve values and switch to its crackle loop.
    ///
    /// A missing noise asset is logged and leaves the session without
    /// crackle; it does not fail the selection.
    pub fn select_preset(&mut self, id: &str) -> Result<(), EngineError> {
        self.ensure_alive()?;
        let preset = presets::find(id).ok_or_else(|| EngineError::UnknownPreset(id.to_string()))?;

        for param in ParamId::ALL {
            self.params.store(param, preset.params.get(param));
        }

        if let Err(e) = self.load_crackle(preset.noise_file) {
            warn!(preset = preset.id, error = %e, "crackle unavailable, continuing without noise");
            self.crackle_file = None;
            self.send(PathCommand::StopCrackle);
        }

        info!(preset = preset.id, "preset selected");
        Ok(())
    }

    // ==================== Export ====================

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    pub fn set_render_seed(&mut self, seed: u64) {
        self.render_seed = seed;
    }

    /// Offline job for the current session
    pub fn render_job(&self) -> Result<RenderJob, EngineError> {
        self.ensure_alive()?;
        let buffer = self
            .buffer
            .clone()
            .ok_or(EngineError::InvalidState("no audio loaded"))?;
        let params = self.params.snapshot();
        let spindle = self.params.spindle_intensity();

        Ok(RenderJob {
            buffer,
            spindle_intensity: (spindle != params.spindle).then_some(spindle),
            params,
            pitch_semitones: self.pitch_semitones,
            mastering: self.mastering,
            noise: self.crackle_file.as_deref().and_then(|name| self.noise.get(name)),
            seed: self.render_seed,
            mode: self.render_mode,
        })
    }

    /// Render the session offline and encode it as 16-bit WAV
    pub fn export(&self, progress: impl FnMut(f32)) -> Result<Vec<u8>, EngineError> {
        let job = self.render_job()?;
        info!(mode = ?job.mode, pitch = job.pitch_semitones, "export");
        Ok(OfflineRenderer::default().export(&job, progress)?)
    }

    // ==================== Teardown ====================

    /// Stop everything and tear down the signal path. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.halt(false);
        self.send(PathCommand::Destroy);
        self.buffer = None;
        self.crackle_file = None;
        self.destroyed = true;
        info!("engine destroyed");
        self.notify();
        self.subscribers.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}
