//! Effect parameters and the lock-free bank shared with the audio thread

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Clamp that also absorbs NaN (maps it to `lo`)
#[inline]
pub fn clamp_param(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Clamp to [0, 1]
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    clamp_param(value, 0.0, 1.0)
}

/// One of the twelve user-facing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Dropout,
    Deterioration,
    Crackle,
    /// Alias of `Spindle`: both drive spindle intensity
    Warp,
    /// Age filter corner in Hz
    Age,
    Riaa,
    Stylus,
    Pinch,
    GhostEcho,
    WornStylus,
    InnerGroove,
    Spindle,
}

impl ParamId {
    /// Canonical order; presets apply values in this order
    pub const ALL: [ParamId; 12] = [
        ParamId::Dropout,
        ParamId::Deterioration,
        ParamId::Crackle,
        ParamId::Warp,
        ParamId::Age,
        ParamId::Riaa,
        ParamId::Stylus,
        ParamId::Pinch,
        ParamId::GhostEcho,
        ParamId::WornStylus,
        ParamId::InnerGroove,
        ParamId::Spindle,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name used by control surfaces
    pub fn name(self) -> &'static str {
        match self {
            ParamId::Dropout => "dropout",
            ParamId::Deterioration => "deterioration",
            ParamId::Crackle => "crackle",
            ParamId::Warp => "warp",
            ParamId::Age => "age",
            ParamId::Riaa => "riaa",
            ParamId::Stylus => "stylus",
            ParamId::Pinch => "pinch",
            ParamId::GhostEcho => "ghostEcho",
            ParamId::WornStylus => "wornStylus",
            ParamId::InnerGroove => "innerGroove",
            ParamId::Spindle => "spindle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }

    /// Declared (min, max)
    pub fn range(self) -> (f32, f32) {
        match self {
            ParamId::Age => (200.0, 8000.0),
            _ => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f32 {
        EffectParameters::default().get(self)
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (lo, hi) = self.range();
        clamp_param(value, lo, hi)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown parameter '{}'", s))
    }
}

/// Snapshot of all twelve parameter values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParameters {
    pub dropout: f32,
    pub deterioration: f32,
    pub crackle: f32,
    pub warp: f32,
    pub age: f32,
    pub riaa: f32,
    pub stylus: f32,
    pub pinch: f32,
    pub ghost_echo: f32,
    pub worn_stylus: f32,
    pub inner_groove: f32,
    pub spindle: f32,
}

impl EffectParameters {
    /// Values in `ParamId::ALL` order
    pub const fn from_array(v: [f32; 12]) -> Self {
        Self {
            dropout: v[0],
            deterioration: v[1],
            crackle: v[2],
            warp: v[3],
            age: v[4],
            riaa: v[5],
            stylus: v[6],
            pinch: v[7],
            ghost_echo: v[8],
            worn_stylus: v[9],
            inner_groove: v[10],
            spindle: v[11],
        }
    }

    pub fn to_array(&self) -> [f32; 12] {
        [
            self.dropout,
            self.deterioration,
            self.crackle,
            self.warp,
            self.age,
            self.riaa,
            self.stylus,
            self.pinch,
            self.ghost_echo,
            self.worn_stylus,
            self.inner_groove,
            self.spindle,
        ]
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.to_array()[id.index()]
    }

    /// Store a clamped value
    pub fn set(&mut self, id: ParamId, value: f32) {
        let value = id.clamp(value);
        let slot = match id {
            ParamId::Dropout => &mut self.dropout,
            ParamId::Deterioration => &mut self.deterioration,
            ParamId::Crackle => &mut self.crackle,
            ParamId::Warp => &mut self.warp,
            ParamId::Age => &mut self.age,
            ParamId::Riaa => &mut self.riaa,
            ParamId::Stylus => &mut self.stylus,
            ParamId::Pinch => &mut self.pinch,
            ParamId::GhostEcho => &mut self.ghost_echo,
            ParamId::WornStylus => &mut self.worn_stylus,
            ParamId::InnerGroove => &mut self.inner_groove,
            ParamId::Spindle => &mut self.spindle,
        };
        *slot = value;
    }

    /// Copy with every field clamped to its range
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        for id in ParamId::ALL {
            out.set(id, self.get(id));
        }
        out
    }
}

impl Default for EffectParameters {
    /// The pristine "untouched" settings
    fn default() -> Self {
        Self::from_array([0.0, 0.0, 0.05, 0.0, 200.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }
}

/// Parameter slots shared between control and audio threads.
///
/// Writers store f32 bits and bump `generation` with release ordering;
/// the audio side compares generations and re-reads only on change.
/// Neither side ever blocks.
pub struct ParameterBank {
    values: [AtomicU32; 12],
    /// Effective spindle intensity: last write to either `warp` or `spindle`
    spindle_intensity: AtomicU32,
    generation: AtomicU64,
}

impl ParameterBank {
    pub fn new(initial: &EffectParameters) -> Self {
        let initial = initial.clamped();
        let values = initial.to_array().map(|v| AtomicU32::new(v.to_bits()));
        Self {
            values,
            spindle_intensity: AtomicU32::new(initial.spindle.to_bits()),
            generation: AtomicU64::new(0),
        }
    }

    /// Store a clamped value; returns what was stored
    pub fn store(&self, id: ParamId, value: f32) -> f32 {
        let value = id.clamp(value);
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
        if matches!(id, ParamId::Warp | ParamId::Spindle) {
            self.spindle_intensity.store(value.to_bits(), Ordering::Relaxed);
        }
        self.generation.fetch_add(1, Ordering::Release);
        value
    }

    /// Store all twelve values in canonical order
    pub fn store_all(&self, params: &EffectParameters) {
        for id in ParamId::ALL {
            self.store(id, params.get(id));
        }
    }

    #[inline]
    pub fn load(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn spindle_intensity(&self) -> f32 {
        f32::from_bits(self.spindle_intensity.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> EffectParameters {
        let mut values = [0.0f32; 12];
        for id in ParamId::ALL {
            values[id.index()] = self.load(id);
        }
        EffectParameters::from_array(values)
    }
}

impl Default for ParameterBank {
    fn default() -> Self {
        Self::new(&EffectParameters::default())
    }
}
