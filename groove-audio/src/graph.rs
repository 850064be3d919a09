//! Stage graph and the fixed vinyl topology
//!
//! ```text
//! transport → StereoBalance → VinylDamage → RIAA → Age → GhostEcho
//!           → WornStylus → StylusResonance → Pinch → InnerGroove
//!           → Spindle → (+ crackle) → Master → output
//! ```
//!
//! `vinyl_chain` is the only place the topology is defined; the live
//! signal path and the offline renderer both build from it.

use crate::mastering::MasterProcessor;
use crate::params::{EffectParameters, ParamId};
use crate::stage::{EngineContext, Stage};
use crate::vinyl::{
    AgeFilter, DropoutSwitch, GhostEcho, InnerGrooveDistortion, PinchEffect, RiaaEmphasis, SpindleEccentricity,
    StereoBalance, StylusResonance, VinylDamageProcessor, WornStylus,
};

/// Every stage kind the chain can hold
pub enum ChainStage {
    StereoBalance(StereoBalance),
    VinylDamage(VinylDamageProcessor),
    Riaa(RiaaEmphasis),
    Age(AgeFilter),
    GhostEcho(GhostEcho),
    WornStylus(WornStylus),
    Stylus(StylusResonance),
    Pinch(PinchEffect),
    InnerGroove(InnerGrooveDistortion),
    Spindle(SpindleEccentricity),
    Master(MasterProcessor),
}

impl ChainStage {
    #[inline]
    fn as_stage(&self) -> &dyn Stage {
        match self {
            ChainStage::StereoBalance(s) => s as &dyn Stage,
            ChainStage::VinylDamage(s) => s as &dyn Stage,
            ChainStage::Riaa(s) => s as &dyn Stage,
            ChainStage::Age(s) => s as &dyn Stage,
            ChainStage::GhostEcho(s) => s as &dyn Stage,
            ChainStage::WornStylus(s) => s as &dyn Stage,
            ChainStage::Stylus(s) => s as &dyn Stage,
            ChainStage::Pinch(s) => s as &dyn Stage,
            ChainStage::InnerGroove(s) => s as &dyn Stage,
            ChainStage::Spindle(s) => s as &dyn Stage,
            ChainStage::Master(s) => s as &dyn Stage,
        }
    }
}

impl Stage for ChainStage {
    #[inline]
    fn process(&mut self, samples: &mut [f32]) {
        match self {
            ChainStage::StereoBalance(s) => s.process(samples),
            ChainStage::VinylDamage(s) => s.process(samples),
            ChainStage::Riaa(s) => s.process(samples),
            ChainStage::Age(s) => s.process(samples),
            ChainStage::GhostEcho(s) => s.process(samples),
            ChainStage::WornStylus(s) => s.process(samples),
            ChainStage::Stylus(s) => s.process(samples),
            ChainStage::Pinch(s) => s.process(samples),
            ChainStage::InnerGroove(s) => s.process(samples),
            ChainStage::Spindle(s) => s.process(samples),
            ChainStage::Master(s) => s.process(samples),
        }
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        match self {
            ChainStage::StereoBalance(s) => s.set_parameter(name, value),
            ChainStage::VinylDamage(s) => s.set_parameter(name, value),
            ChainStage::Riaa(s) => s.set_parameter(name, value),
            ChainStage::Age(s) => s.set_parameter(name, value),
            ChainStage::GhostEcho(s) => s.set_parameter(name, value),
            ChainStage::WornStylus(s) => s.set_parameter(name, value),
            ChainStage::Stylus(s) => s.set_parameter(name, value),
            ChainStage::Pinch(s) => s.set_parameter(name, value),
            ChainStage::InnerGroove(s) => s.set_parameter(name, value),
            ChainStage::Spindle(s) => s.set_parameter(name, value),
            ChainStage::Master(s) => s.set_parameter(name, value),
        }
    }

    fn reset(&mut self) {
        match self {
            ChainStage::StereoBalance(s) => s.reset(),
            ChainStage::VinylDamage(s) => s.reset(),
            ChainStage::Riaa(s) => s.reset(),
            ChainStage::Age(s) => s.reset(),
            ChainStage::GhostEcho(s) => s.reset(),
            ChainStage::WornStylus(s) => s.reset(),
            ChainStage::Stylus(s) => s.reset(),
            ChainStage::Pinch(s) => s.reset(),
            ChainStage::InnerGroove(s) => s.reset(),
            ChainStage::Spindle(s) => s.reset(),
            ChainStage::Master(s) => s.reset(),
        }
    }

    fn destroy(&mut self) {
        match self {
            ChainStage::StereoBalance(s) => s.destroy(),
            ChainStage::VinylDamage(s) => s.destroy(),
            ChainStage::Riaa(s) => s.destroy(),
            ChainStage::Age(s) => s.destroy(),
            ChainStage::GhostEcho(s) => s.destroy(),
            ChainStage::WornStylus(s) => s.destroy(),
            ChainStage::Stylus(s) => s.destroy(),
            ChainStage::Pinch(s) => s.destroy(),
            ChainStage::InnerGroove(s) => s.destroy(),
            ChainStage::Spindle(s) => s.destroy(),
            ChainStage::Master(s) => s.destroy(),
        }
    }

    fn is_destroyed(&self) -> bool {
        self.as_stage().is_destroyed()
    }

    fn name(&self) -> &'static str {
        self.as_stage().name()
    }
}

/// Index of a stage inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(usize);

/// Where a stage's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Stage(StageId),
    Destination,
}

struct Node {
    stage: ChainStage,
    output: Option<Output>,
}

/// Stages with single-output wiring, walked from the head each quantum
#[derive(Default)]
pub struct StageGraph {
    nodes: Vec<Node>,
    head: Option<StageId>,
    // Where the parallel noise bus joins
    aux_input: Option<StageId>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: ChainStage) -> StageId {
        self.nodes.push(Node { stage, output: None });
        StageId(self.nodes.len() - 1)
    }

    pub fn set_head(&mut self, id: StageId) {
        self.head = Some(id);
    }

    /// Mix the aux bus into this stage's input
    pub fn set_aux_input(&mut self, id: StageId) {
        self.aux_input = Some(id);
    }

    pub fn connect(&mut self, from: StageId, to: Output) {
        if let Some(node) = self.nodes.get_mut(from.0) {
            node.output = Some(to);
        }
    }

    pub fn disconnect_all(&mut self, id: StageId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.output = None;
        }
    }

    pub fn output_of(&self, id: StageId) -> Option<Output> {
        self.nodes.get(id.0).and_then(|n| n.output)
    }

    pub fn stage(&self, id: StageId) -> Option<&ChainStage> {
        self.nodes.get(id.0).map(|n| &n.stage)
    }

    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut ChainStage> {
        self.nodes.get_mut(id.0).map(|n| &mut n.stage)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stage names from the head in signal order
    pub fn order(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut current = self.head;
        while let Some(id) = current {
            if names.len() > self.nodes.len() {
                break;
            }
            let Some(node) = self.nodes.get(id.0) else {
                break;
            };
            names.push(node.stage.name());
            current = match node.output {
                Some(Output::Stage(next)) => Some(next),
                _ => None,
            };
        }
        names
    }

    /// Run `block` through the chain. `aux` is summed in at the aux input.
    /// Returns false (and silences the block) if the walk does not reach
    /// the destination.
    pub fn render(&mut self, block: &mut [f32], aux: Option<&[f32]>) -> bool {
        let mut current = self.head;
        let mut steps = 0;
        while let Some(id) = current {
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            if self.aux_input == Some(id) {
                if let Some(aux) = aux {
                    for (s, a) in block.iter_mut().zip(aux.iter()) {
                        *s += *a;
                    }
                }
            }
            let Some(node) = self.nodes.get_mut(id.0) else {
                break;
            };
            node.stage.process(block);
            match node.output {
                Some(Output::Stage(next)) => current = Some(next),
                Some(Output::Destination) => return true,
                None => break,
            }
        }
        block.fill(0.0);
        false
    }

    /// Destroy every stage and drop all wiring
    pub fn destroy_all(&mut self) {
        for node in &mut self.nodes {
            node.stage.destroy();
            node.output = None;
        }
    }
}

/// Handles into the fixed chain
#[derive(Debug, Clone, Copy)]
pub struct ChainIds {
    pub stereo_balance: StageId,
    pub damage: StageId,
    pub riaa: StageId,
    pub age: StageId,
    pub ghost_echo: StageId,
    pub worn_stylus: StageId,
    pub stylus: StageId,
    pub pinch: StageId,
    pub inner_groove: StageId,
    pub spindle: StageId,
    pub master: StageId,
}

impl ChainIds {
    /// Stage that owns a parameter (crackle is not a chain stage)
    pub fn owner(&self, id: ParamId) -> Option<StageId> {
        match id {
            ParamId::Dropout | ParamId::Deterioration => Some(self.damage),
            ParamId::Crackle => None,
            ParamId::Warp | ParamId::Spindle => Some(self.spindle),
            ParamId::Age => Some(self.age),
            ParamId::Riaa => Some(self.riaa),
            ParamId::Stylus => Some(self.stylus),
            ParamId::Pinch => Some(self.pinch),
            ParamId::GhostEcho => Some(self.ghost_echo),
            ParamId::WornStylus => Some(self.worn_stylus),
            ParamId::InnerGroove => Some(self.inner_groove),
        }
    }
}

/// Build the fixed chain with `params` applied in canonical order
pub fn vinyl_chain(
    context: &EngineContext,
    params: &EffectParameters,
    switch: DropoutSwitch,
    seed: u64,
) -> (StageGraph, ChainIds) {
    let mut graph = StageGraph::new();
    let ids = ChainIds {
        stereo_balance: graph.add(ChainStage::StereoBalance(StereoBalance::new())),
        damage: graph.add(ChainStage::VinylDamage(VinylDamageProcessor::new(context, switch, seed))),
        riaa: graph.add(ChainStage::Riaa(RiaaEmphasis::new(context))),
        age: graph.add(ChainStage::Age(AgeFilter::new(context))),
        ghost_echo: graph.add(ChainStage::GhostEcho(GhostEcho::new(context))),
        worn_stylus: graph.add(ChainStage::WornStylus(WornStylus::new(context))),
        stylus: graph.add(ChainStage::Stylus(StylusResonance::new(context))),
        pinch: graph.add(ChainStage::Pinch(PinchEffect::new(context))),
        inner_groove: graph.add(ChainStage::InnerGroove(InnerGrooveDistortion::new(context))),
        spindle: graph.add(ChainStage::Spindle(SpindleEccentricity::new(context))),
        master: graph.add(ChainStage::Master(MasterProcessor::new(context))),
    };

    let order = [
        ids.stereo_balance,
        ids.damage,
        ids.riaa,
        ids.age,
        ids.ghost_echo,
        ids.worn_stylus,
        ids.stylus,
        ids.pinch,
        ids.inner_groove,
        ids.spindle,
        ids.master,
    ];
    for pair in order.windows(2) {
        graph.connect(pair[0], Output::Stage(pair[1]));
    }
    graph.connect(ids.master, Output::Destination);
    graph.set_head(ids.stereo_balance);
    graph.set_aux_input(ids.master);

    for id in ParamId::ALL {
        if let Some(owner) = ids.owner(id) {
            if let Some(stage) = graph.stage_mut(owner) {
                stage.set_parameter(id.name(), params.get(id));
            }
        }
    }

    (graph, ids)
}
