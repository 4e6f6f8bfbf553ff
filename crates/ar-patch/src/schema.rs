//! Parameter schema: identity, range, and default for every parameter.
//!
//! The schema is a fixed table built once at startup. A `ParamId` is a
//! dense index into that table; lookups by `"Group/Name"` string happen
//! only when crossing the persistence boundary.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

// Numbered slot parameter names, spelled out so the table stays
// statically named and rebuilding a schema never allocates name
// storage.
const SLOT_SOURCE: [&str; 8] = [
    "Slot 1 Source",
    "Slot 2 Source",
    "Slot 3 Source",
    "Slot 4 Source",
    "Slot 5 Source",
    "Slot 6 Source",
    "Slot 7 Source",
    "Slot 8 Source",
];
const SLOT_TARGET: [&str; 8] = [
    "Slot 1 Target",
    "Slot 2 Target",
    "Slot 3 Target",
    "Slot 4 Target",
    "Slot 5 Target",
    "Slot 6 Target",
    "Slot 7 Target",
    "Slot 8 Target",
];
const SLOT_AMOUNT: [&str; 8] = [
    "Slot 1 Amount",
    "Slot 2 Amount",
    "Slot 3 Amount",
    "Slot 4 Amount",
    "Slot 5 Amount",
    "Slot 6 Amount",
    "Slot 7 Amount",
    "Slot 8 Amount",
];

/// Declaration of a single parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub group: &'static str,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

/// Dense index of a parameter in the schema table. The default id is
/// the table's first entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(u16);

impl ParamId {
    /// Index into a patch's value array.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The full parameter table plus a path index for boundary lookups.
pub struct Schema {
    specs: Vec<ParamSpec>,
    by_path: BTreeMap<String, u16>,
}

impl Schema {
    /// Build the synth's parameter table.
    pub fn synth() -> Self {
        let mut s = Self {
            specs: Vec::new(),
            by_path: BTreeMap::new(),
        };

        s.oscillator("Oscillator 1");
        s.oscillator("Oscillator 2");

        s.push("Ladder Filter", "Type", 0.0, 2.0, 0.0);
        s.push("Ladder Filter", "Cutoff", 20.0, 20000.0, 20000.0);
        s.push("Ladder Filter", "Res", 0.0, 1.0, 0.0);
        s.push("Ladder Filter", "Drive", 1.0, 2.0, 1.0);
        s.push("Ladder Filter", "KeyTrack", 0.0, 1.0, 0.5);
        s.push("Ladder Filter", "Slope", 0.0, 1.0, 1.0);

        s.envelope("Amp Env", false);
        s.envelope("Filter Env", true);
        s.envelope("Pitch Env", true);
        s.envelope("Mod Env", true);
        for i in 0..4 {
            s.slot_pair("Mod Env", i);
        }

        s.lfo("LFO 1");
        s.lfo("LFO 2");
        s.lfo("LFO 3");

        for i in 0..8 {
            s.push("Mod", SLOT_SOURCE[i], 0.0, 9.0, 0.0);
            s.slot_pair("Mod", i);
        }

        s.push("Arp", "Arp On", 0.0, 1.0, 0.0);
        s.push("Arp", "Rate Note", 0.0, 8.0, 2.0);
        s.push("Arp", "Mode", 0.0, 4.0, 0.0);
        s.push("Arp", "Octave", 1.0, 4.0, 1.0);
        s.push("Arp", "Gate", 1.0, 100.0, 80.0);
        s.push("Arp", "Latch", 0.0, 1.0, 0.0);

        s.push("Control", "Mode", 0.0, 1.0, 0.0);
        s.push("Control", "PB Range", 0.0, 24.0, 2.0);
        s.push("Control", "Tempo", 20.0, 300.0, 120.0);
        s.push("Control", "Tempo Sync", 0.0, 1.0, 1.0);

        s.push("Amp Output", "Level", 0.0, 1.0, 0.8);

        s
    }

    fn oscillator(&mut self, group: &'static str) {
        self.push(group, "Waveform", 0.0, 3.0, 1.0);
        self.push(group, "Symmetry", 0.0, 1.0, 0.5);
        self.push(group, "Detune", -100.0, 100.0, 0.0);
        self.push(group, "Transp", -24.0, 24.0, 0.0);
        self.push(group, "Phase", 0.0, 360.0, 0.0);
        self.push(group, "KeySync", 0.0, 1.0, 1.0);
        self.push(group, "Volume", 0.0, 1.0, if group == "Oscillator 1" { 0.8 } else { 0.0 });
        self.push(group, "Pan", -1.0, 1.0, 0.0);
        self.push(group, "Drive", 0.0, 1.0, 0.0);
        self.push(group, "BitRedux", 0.0, 1.0, 0.0);
        self.push(group, "Fold", 0.0, 1.0, 0.0);
        self.push(group, "Unison", 1.0, 8.0, 1.0);
        self.push(group, "USpread", 0.0, 1.0, 0.2);
    }

    fn envelope(&mut self, group: &'static str, with_amount: bool) {
        self.push(group, "Delay", 0.0, 10000.0, 0.0);
        self.push(group, "Attack", 0.0, 10000.0, 10.0);
        self.push(group, "Hold", 0.0, 10000.0, 0.0);
        self.push(group, "Decay", 0.0, 10000.0, 500.0);
        self.push(group, "Sustain", 0.0, 1.0, 0.7);
        self.push(group, "Release", 0.0, 10000.0, 500.0);
        self.push(group, "Env Mode", 0.0, 1.0, 0.0);
        if with_amount {
            self.push(group, "Amount", -100.0, 100.0, 0.0);
        }
    }

    fn lfo(&mut self, group: &'static str) {
        self.push(group, "Shape", 0.0, 5.0, 0.0);
        self.push(group, "Sync", 0.0, 1.0, 0.0);
        self.push(group, "Rate Hz", 0.02, 20.0, 1.0);
        self.push(group, "Rate Note", 0.0, 8.0, 4.0);
        self.push(group, "KeySync", 0.0, 1.0, 1.0);
        self.push(group, "Phase", 0.0, 360.0, 0.0);
        self.push(group, "Delay", 0.0, 5000.0, 0.0);
        self.push(group, "Fade", 0.0, 5000.0, 0.0);
        for i in 0..4 {
            self.slot_pair(group, i);
        }
    }

    fn slot_pair(&mut self, group: &'static str, slot: usize) {
        self.push(group, SLOT_TARGET[slot], 0.0, 38.0, 0.0);
        self.push(group, SLOT_AMOUNT[slot], -100.0, 100.0, 0.0);
    }

    fn push(&mut self, group: &'static str, name: &'static str, min: f32, max: f32, default: f32) {
        let id = self.specs.len() as u16;
        self.specs.push(ParamSpec { group, name, min, max, default });
        self.by_path.insert(format!("{group}/{name}"), id);
    }

    /// Number of parameters in the table.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a `"Group/Name"` path to its id, if the schema knows it.
    pub fn lookup(&self, path: &str) -> Option<ParamId> {
        self.by_path.get(path).map(|&i| ParamId(i))
    }

    /// Resolve a (group, name) pair. Used by the engine at construction
    /// to precompute every id it reads per tick.
    pub fn id(&self, group: &str, name: &str) -> Option<ParamId> {
        self.lookup(&format!("{group}/{name}"))
    }

    pub fn spec(&self, id: ParamId) -> &ParamSpec {
        &self.specs[id.index()]
    }

    /// Declared default; unknown ids cannot occur (ids only come from
    /// this schema), so this is total.
    pub fn default_value(&self, id: ParamId) -> f32 {
        self.specs[id.index()].default
    }

    pub fn range(&self, id: ParamId) -> (f32, f32) {
        let s = &self.specs[id.index()];
        (s.min, s.max)
    }

    /// Clamp a value into the parameter's declared range.
    pub fn clamp(&self, id: ParamId, value: f32) -> f32 {
        let s = &self.specs[id.index()];
        if value.is_nan() {
            return s.default;
        }
        value.clamp(s.min, s.max)
    }

    /// `"Group/Name"` path for persistence.
    pub fn path(&self, id: ParamId) -> String {
        let s = &self.specs[id.index()];
        format!("{}/{}", s.group, s.name)
    }

    /// Iterate all (id, spec) pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &ParamSpec)> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, s)| (ParamId(i as u16), s))
    }
}
