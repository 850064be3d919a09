//! Signal path - the audio-domain half of the engine
//!
//! Owns the transport, the stage graph and the crackle player. Runs inside
//! the audio callback (or the offline renderer): drains pending commands,
//! re-routes parameters that changed since the last quantum, then renders
//! in `RENDER_QUANTUM` frame steps. Never blocks and never allocates after
//! construction except when a command hands over a new buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::buffer::AudioBuffer;
use crate::graph::{vinyl_chain, ChainIds, ChainStage, StageGraph};
use crate::mastering::MasteringMode;
use crate::params::{EffectParameters, ParamId, ParameterBank};
use crate::stage::{EngineContext, Stage, RENDER_QUANTUM};
use crate::transport::{PlaybackState, Transport};
use crate::vinyl::{CrackleProcessor, DropoutSwitch};

/// Commands sent from the control domain
#[derive(Debug, Clone)]
pub enum PathCommand {
    /// Replace the transport buffer (stops playback)
    Load(Arc<AudioBuffer>),
    /// Start the transport at an offset with a playback rate. `run` tags
    /// the end event of this start.
    Start { run: u64, offset_secs: f64, rate: f64 },
    Stop,
    /// New pitch ratio for the transport and the crackle loop
    SetRate(f64),
    SetMastering(MasteringMode),
    StartCrackle {
        buffer: Arc<AudioBuffer>,
        intensity: f32,
        pitch_ratio: f64,
    },
    StopCrackle,
    /// Tear down every stage
    Destroy,
}

/// Events sent back to the control domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    /// The transport reached the end of the buffer during start `run`
    Ended { run: u64 },
}

/// Transport position published for lock-free reads (f64 seconds)
#[derive(Debug, Default)]
pub struct PositionCell(AtomicU64);

impl PositionCell {
    #[inline]
    pub fn store(&self, secs: f64) {
        self.0.store(secs.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub struct SignalPath {
    context: EngineContext,
    graph: StageGraph,
    ids: ChainIds,
    transport: Transport,
    crackle: CrackleProcessor,
    params: Arc<ParameterBank>,
    seen_generation: u64,
    applied: EffectParameters,
    applied_spindle: f32,
    dropout: DropoutSwitch,
    position: Arc<PositionCell>,
    commands: Option<Receiver<PathCommand>>,
    events: Option<Sender<PathEvent>>,
    ended_sent: bool,
    run: u64,
    noise: Vec<f32>,
    destroyed: bool,
}

impl SignalPath {
    /// Build a fresh chain from the bank's current values
    pub fn new(context: EngineContext, params: Arc<ParameterBank>, seed: u64) -> Self {
        let seen_generation = params.generation();
        let applied = params.snapshot();
        let applied_spindle = params.spindle_intensity();
        let dropout = DropoutSwitch::new();

        let (mut graph, ids) = vinyl_chain(&context, &applied, dropout.clone(), seed);
        if let Some(stage) = graph.stage_mut(ids.spindle) {
            stage.set_parameter("spindle", applied_spindle);
        }

        let mut crackle = CrackleProcessor::new(&context);
        crackle.set_intensity(applied.crackle);

        Self {
            context,
            graph,
            ids,
            transport: Transport::new(context.channel_count(), context.sample_rate),
            crackle,
            params,
            seen_generation,
            applied,
            applied_spindle,
            dropout,
            position: Arc::new(PositionCell::default()),
            commands: None,
            events: None,
            ended_sent: false,
            run: 0,
            noise: vec![0.0; RENDER_QUANTUM * context.channel_count()],
            destroyed: false,
        }
    }

    /// Attach the control channels used by a live engine
    pub fn connect_control(&mut self, commands: Receiver<PathCommand>, events: Sender<PathEvent>) {
        self.commands = Some(commands);
        self.events = Some(events);
    }

    pub fn context(&self) -> EngineContext {
        self.context
    }

    pub fn dropout_switch(&self) -> DropoutSwitch {
        self.dropout.clone()
    }

    pub fn position_cell(&self) -> Arc<PositionCell> {
        Arc::clone(&self.position)
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn ids(&self) -> ChainIds {
        self.ids
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn crackle(&self) -> &CrackleProcessor {
        &self.crackle
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn mastering_mode(&self) -> Option<MasteringMode> {
        match self.graph.stage(self.ids.master) {
            Some(ChainStage::Master(m)) => Some(m.mode()),
            _ => None,
        }
    }

    /// Handle a single command
    pub fn apply(&mut self, cmd: PathCommand) {
        if self.destroyed {
            return;
        }
        match cmd {
            PathCommand::Load(buffer) => {
                self.transport.load(buffer);
                self.ended_sent = false;
            }
            PathCommand::Start { run, offset_secs, rate } => {
                self.run = run;
                self.transport.start(offset_secs, rate, 0);
                self.crackle.set_pitch(rate);
                self.ended_sent = false;
            }
            PathCommand::Stop => self.transport.stop(),
            PathCommand::SetRate(rate) => {
                self.transport.set_rate(rate);
                self.crackle.set_pitch(rate);
            }
            PathCommand::SetMastering(mode) => {
                if let Some(ChainStage::Master(master)) = self.graph.stage_mut(self.ids.master) {
                    master.set_mode(mode);
                }
            }
            PathCommand::StartCrackle {
                buffer,
                intensity,
                pitch_ratio,
            } => {
                self.crackle.play(buffer, intensity);
                self.crackle.set_pitch(pitch_ratio);
            }
            PathCommand::StopCrackle => self.crackle.stop(),
            PathCommand::Destroy => self.destroy(),
        }
    }

    /// Start the transport after `delay_frames` of silence (offline use)
    pub fn start_delayed(&mut self, offset_secs: f64, rate: f64, delay_frames: u64) {
        if self.destroyed {
            return;
        }
        self.transport.start(offset_secs, rate, delay_frames);
        self.crackle.set_pitch(rate);
        self.ended_sent = false;
    }

    fn drain_commands(&mut self) {
        let Some(rx) = self.commands.take() else {
            return;
        };
        while let Ok(cmd) = rx.try_recv() {
            self.apply(cmd);
        }
        self.commands = Some(rx);
    }

    /// Route parameters written since the last quantum to their stages
    fn sync_parameters(&mut self) {
        let generation = self.params.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;

        let snapshot = self.params.snapshot();
        for id in ParamId::ALL {
            let value = snapshot.get(id);
            if value == self.applied.get(id) {
                continue;
            }
            match id {
                ParamId::Crackle => self.crackle.set_intensity(value),
                // Routed below through the effective alias value
                ParamId::Warp | ParamId::Spindle => {}
                _ => {
                    if let Some(stage) = self.ids.owner(id).and_then(|owner| self.graph.stage_mut(owner)) {
                        stage.set_parameter(id.name(), value);
                    }
                }
            }
        }

        let spindle = self.params.spindle_intensity();
        if spindle != self.applied_spindle {
            if let Some(stage) = self.graph.stage_mut(self.ids.spindle) {
                stage.set_parameter("spindle", spindle);
            }
        }

        self.applied = snapshot;
        self.applied_spindle = spindle;
    }

    fn render_quantum(&mut self, block: &mut [f32]) {
        let channels = self.context.channel_count();

        match self.graph.stage_mut(self.ids.spindle) {
            Some(ChainStage::Spindle(spindle)) => {
                for frame in block.chunks_exact_mut(channels) {
                    let modulation = spindle.next_modulation() as f64;
                    self.transport.read_frame(modulation, frame);
                }
            }
            _ => self.transport.process(block),
        }

        let noise = &mut self.noise[..block.len()];
        let has_noise = self.crackle.render(noise);
        self.graph.render(block, if has_noise { Some(&*noise) } else { None });
    }

    /// Fill `output` (interleaved) with the next block of audio
    pub fn process(&mut self, output: &mut [f32]) {
        self.drain_commands();
        if self.destroyed {
            output.fill(0.0);
            return;
        }
        self.sync_parameters();

        let channels = self.context.channel_count();
        let usable = output.len() - output.len() % channels;
        let (body, tail) = output.split_at_mut(usable);
        tail.fill(0.0);

        for block in body.chunks_mut(RENDER_QUANTUM * channels) {
            self.render_quantum(block);
        }

        self.position.store(self.transport.position_secs());

        if self.transport.state() == PlaybackState::Ended && !self.ended_sent {
            self.ended_sent = true;
            if let Some(events) = self.events.as_ref() {
                let _ = events.try_send(PathEvent::Ended { run: self.run });
            }
        }
    }

    /// Stop everything and destroy every stage. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.transport.stop();
        self.dropout.stop();
        self.crackle.destroy();
        self.graph.destroy_all();
        self.destroyed = true;
    }
}
