//! Modulation matrix resolution.
//!
//! Runs once per control tick per voice. Two passes keep the work
//! bounded: pass one applies the mod envelope's dedicated slots and
//! the eight generic slots, pass two applies each LFO's dedicated
//! slots with their amounts adjusted by whatever pass one routed at
//! them. An LFO slot aimed at its own LFO's amounts is the one true
//! cycle; it is frozen at zero and flagged rather than resolved.

use ar_patch::{ModSlot, ModSource, ModTarget, OscDest, SOURCE_SLOTS};

use crate::lfo::LfoSettings;

/// Number of modulation destinations.
pub const DEST_COUNT: usize = 30;

const DEST_CUTOFF: usize = 16;
const DEST_RES: usize = 17;
const DEST_LFO_BASE: usize = 18;

/// Accumulated modulation offsets, one slot per destination, all in
/// normalized units. Scaling to parameter units happens where the
/// values are applied.
#[derive(Clone, Copy, Debug)]
pub struct ModDeltas {
    values: [f32; DEST_COUNT],
    /// Set when a self-referential LFO amount route was frozen.
    pub cycle_blocked: bool,
}

impl ModDeltas {
    pub const ZERO: Self = Self { values: [0.0; DEST_COUNT], cycle_blocked: false };

    pub fn clear(&mut self) {
        self.values = [0.0; DEST_COUNT];
        self.cycle_blocked = false;
    }

    pub fn osc(&self, osc: usize, dest: OscDest) -> f32 {
        self.values[osc_index(osc, dest)]
    }

    pub fn cutoff(&self) -> f32 {
        self.values[DEST_CUTOFF]
    }

    pub fn resonance(&self) -> f32 {
        self.values[DEST_RES]
    }

    pub fn lfo_amount(&self, lfo: usize, slot: usize) -> f32 {
        self.values[DEST_LFO_BASE + lfo * SOURCE_SLOTS + slot]
    }

    fn add(&mut self, target: ModTarget, delta: f32) {
        match target {
            ModTarget::None => {}
            ModTarget::Osc1(d) => self.values[osc_index(0, d)] += delta,
            ModTarget::Osc2(d) => self.values[osc_index(1, d)] += delta,
            ModTarget::BothOsc(d) => {
                self.values[osc_index(0, d)] += delta;
                self.values[osc_index(1, d)] += delta;
            }
            ModTarget::FilterCutoff => self.values[DEST_CUTOFF] += delta,
            ModTarget::FilterRes => self.values[DEST_RES] += delta,
            ModTarget::LfoAmount { lfo, slot } => {
                self.values[DEST_LFO_BASE + lfo as usize * SOURCE_SLOTS + slot as usize] += delta;
            }
        }
    }
}

fn osc_index(osc: usize, dest: OscDest) -> usize {
    osc * OscDest::COUNT
        + match dest {
            OscDest::Pitch => 0,
            OscDest::Symmetry => 1,
            OscDest::Fold => 2,
            OscDest::Drive => 3,
            OscDest::BitRedux => 4,
            OscDest::Level => 5,
            OscDest::Pan => 6,
            OscDest::Detune => 7,
        }
}

/// Source values for one voice at one control tick. LFO values are
/// pre-fade outputs in [-1, 1]; the envelope value is already scaled
/// by its amount control.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModInputs {
    pub lfo: [f32; 3],
    pub mod_env: f32,
    pub pitch_bend: f32,
    pub mod_wheel: f32,
    pub aftertouch: f32,
    pub velocity: f32,
    /// Note position relative to middle C, normalized to [-1, 1] over
    /// the MIDI range.
    pub key_track: f32,
}

impl ModInputs {
    fn source(&self, source: ModSource) -> f32 {
        match source {
            ModSource::None => 0.0,
            ModSource::Lfo1 => self.lfo[0],
            ModSource::Lfo2 => self.lfo[1],
            ModSource::Lfo3 => self.lfo[2],
            ModSource::ModEnv => self.mod_env,
            ModSource::PitchBend => self.pitch_bend,
            ModSource::ModWheel => self.mod_wheel,
            ModSource::Aftertouch => self.aftertouch,
            ModSource::Velocity => self.velocity,
            ModSource::KeyTrack => self.key_track,
        }
    }
}

/// Resolve all routing into `deltas` for this control tick.
pub fn resolve(
    deltas: &mut ModDeltas,
    inputs: &ModInputs,
    generic: &[ModSlot],
    env_slots: &[(ModTarget, f32); SOURCE_SLOTS],
    lfos: &[LfoSettings; 3],
) {
    deltas.clear();

    // Pass one: mod envelope slots, then the generic matrix.
    for &(target, amount) in env_slots {
        if !target.is_none() {
            deltas.add(target, inputs.mod_env * amount);
        }
    }
    for slot in generic {
        if slot.is_active() {
            deltas.add(slot.target, inputs.source(slot.source) * slot.amount);
        }
    }

    // Pass two: LFO slots, amounts adjusted by what pass one routed
    // at them. Reading the adjustment before writing keeps order
    // within the pass irrelevant for non-cyclic patches.
    for (l, lfo) in lfos.iter().enumerate() {
        for (s, &(target, base)) in lfo.slots.iter().enumerate() {
            if target.is_none() {
                continue;
            }
            if let ModTarget::LfoAmount { lfo: tl, .. } = target {
                if tl as usize == l {
                    deltas.cycle_blocked = true;
                    continue;
                }
            }
            let amount = (base + deltas.lfo_amount(l, s)).clamp(-1.0, 1.0);
            deltas.add(target, inputs.lfo[l] * amount);
        }
    }
}
