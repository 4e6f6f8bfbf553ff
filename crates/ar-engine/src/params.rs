//! Parameter id table and per-block settings decode.
//!
//! The engine never does string lookups on the audio thread. All ids
//! are resolved once at construction; each block the active patch is
//! decoded into plain structs the voices render from.

use ar_patch::{ModSlot, ModSource, ModTarget, Patch, ParamId, Schema, GENERIC_SLOTS, SOURCE_SLOTS};

use crate::envelope::EnvParams;
use crate::filter::{FilterSettings, FilterType};
use crate::lfo::{sync_increment, LfoSettings, LfoShape};
use crate::osc::{OscSettings, Waveform};

/// Envelope indices within the table.
pub const ENV_AMP: usize = 0;
pub const ENV_FILTER: usize = 1;
pub const ENV_PITCH: usize = 2;
pub const ENV_MOD: usize = 3;

#[derive(Clone, Copy, Debug, Default)]
struct OscIds {
    waveform: ParamId,
    symmetry: ParamId,
    detune: ParamId,
    transpose: ParamId,
    phase: ParamId,
    key_sync: ParamId,
    volume: ParamId,
    pan: ParamId,
    drive: ParamId,
    bit_redux: ParamId,
    fold: ParamId,
    unison: ParamId,
    unison_spread: ParamId,
}

#[derive(Clone, Copy, Debug, Default)]
struct EnvIds {
    delay: ParamId,
    attack: ParamId,
    hold: ParamId,
    decay: ParamId,
    sustain: ParamId,
    release: ParamId,
    mode: ParamId,
    amount: Option<ParamId>,
}

#[derive(Clone, Copy, Debug, Default)]
struct LfoIds {
    shape: ParamId,
    sync: ParamId,
    rate_hz: ParamId,
    rate_note: ParamId,
    key_sync: ParamId,
    phase: ParamId,
    delay: ParamId,
    fade: ParamId,
    slots: [(ParamId, ParamId); SOURCE_SLOTS],
}

/// Every id the engine reads, resolved once.
#[derive(Clone, Debug)]
pub struct ParamTable {
    osc: [OscIds; 2],
    filter_type: ParamId,
    filter_cutoff: ParamId,
    filter_res: ParamId,
    filter_drive: ParamId,
    filter_key_track: ParamId,
    filter_slope: ParamId,
    envs: [EnvIds; 4],
    env_slots: [(ParamId, ParamId); SOURCE_SLOTS],
    lfos: [LfoIds; 3],
    generic: [(ParamId, ParamId, ParamId); GENERIC_SLOTS],
    arp_on: ParamId,
    arp_rate_note: ParamId,
    arp_mode: ParamId,
    arp_octave: ParamId,
    arp_gate: ParamId,
    arp_latch: ParamId,
    ctrl_mode: ParamId,
    ctrl_pb_range: ParamId,
    ctrl_tempo: ParamId,
    ctrl_tempo_sync: ParamId,
    master_level: ParamId,
}

// Every path requested here is declared by `Schema::synth`; the
// default-id fallback cannot fire on a well-formed schema.
fn id(schema: &Schema, group: &str, name: &str) -> ParamId {
    schema.id(group, name).unwrap_or_default()
}

fn slot_ids(schema: &Schema, group: &str, slot: usize) -> (ParamId, ParamId) {
    (
        id(schema, group, &alloc::format!("Slot {slot} Target")),
        id(schema, group, &alloc::format!("Slot {slot} Amount")),
    )
}

impl ParamTable {
    pub fn new(schema: &Schema) -> Self {
        let osc_ids = |group: &str| OscIds {
            waveform: id(schema, group, "Waveform"),
            symmetry: id(schema, group, "Symmetry"),
            detune: id(schema, group, "Detune"),
            transpose: id(schema, group, "Transp"),
            phase: id(schema, group, "Phase"),
            key_sync: id(schema, group, "KeySync"),
            volume: id(schema, group, "Volume"),
            pan: id(schema, group, "Pan"),
            drive: id(schema, group, "Drive"),
            bit_redux: id(schema, group, "BitRedux"),
            fold: id(schema, group, "Fold"),
            unison: id(schema, group, "Unison"),
            unison_spread: id(schema, group, "USpread"),
        };
        let env_ids = |group: &str, with_amount: bool| EnvIds {
            delay: id(schema, group, "Delay"),
            attack: id(schema, group, "Attack"),
            hold: id(schema, group, "Hold"),
            decay: id(schema, group, "Decay"),
            sustain: id(schema, group, "Sustain"),
            release: id(schema, group, "Release"),
            mode: id(schema, group, "Env Mode"),
            amount: with_amount.then(|| id(schema, group, "Amount")),
        };
        let lfo_ids = |group: &str| {
            let mut slots = [(ParamId::default(), ParamId::default()); SOURCE_SLOTS];
            for (i, pair) in slots.iter_mut().enumerate() {
                *pair = slot_ids(schema, group, i + 1);
            }
            LfoIds {
                shape: id(schema, group, "Shape"),
                sync: id(schema, group, "Sync"),
                rate_hz: id(schema, group, "Rate Hz"),
                rate_note: id(schema, group, "Rate Note"),
                key_sync: id(schema, group, "KeySync"),
                phase: id(schema, group, "Phase"),
                delay: id(schema, group, "Delay"),
                fade: id(schema, group, "Fade"),
                slots,
            }
        };

        let mut env_slots = [(ParamId::default(), ParamId::default()); SOURCE_SLOTS];
        for (i, pair) in env_slots.iter_mut().enumerate() {
            *pair = slot_ids(schema, "Mod Env", i + 1);
        }
        let mut generic = [(ParamId::default(), ParamId::default(), ParamId::default()); GENERIC_SLOTS];
        for (i, triple) in generic.iter_mut().enumerate() {
            let n = i + 1;
            let (target, amount) = slot_ids(schema, "Mod", n);
            *triple = (id(schema, "Mod", &alloc::format!("Slot {n} Source")), target, amount);
        }

        Self {
            osc: [osc_ids("Oscillator 1"), osc_ids("Oscillator 2")],
            filter_type: id(schema, "Ladder Filter", "Type"),
            filter_cutoff: id(schema, "Ladder Filter", "Cutoff"),
            filter_res: id(schema, "Ladder Filter", "Res"),
            filter_drive: id(schema, "Ladder Filter", "Drive"),
            filter_key_track: id(schema, "Ladder Filter", "KeyTrack"),
            filter_slope: id(schema, "Ladder Filter", "Slope"),
            envs: [
                env_ids("Amp Env", false),
                env_ids("Filter Env", true),
                env_ids("Pitch Env", true),
                env_ids("Mod Env", true),
            ],
            env_slots,
            lfos: [lfo_ids("LFO 1"), lfo_ids("LFO 2"), lfo_ids("LFO 3")],
            generic,
            arp_on: id(schema, "Arp", "Arp On"),
            arp_rate_note: id(schema, "Arp", "Rate Note"),
            arp_mode: id(schema, "Arp", "Mode"),
            arp_octave: id(schema, "Arp", "Octave"),
            arp_gate: id(schema, "Arp", "Gate"),
            arp_latch: id(schema, "Arp", "Latch"),
            ctrl_mode: id(schema, "Control", "Mode"),
            ctrl_pb_range: id(schema, "Control", "PB Range"),
            ctrl_tempo: id(schema, "Control", "Tempo"),
            ctrl_tempo_sync: id(schema, "Control", "Tempo Sync"),
            master_level: id(schema, "Amp Output", "Level"),
        }
    }

    /// The patch's stored tempo, read at swap time.
    pub fn patch_tempo(&self, patch: &Patch) -> f32 {
        patch.get(self.ctrl_tempo)
    }
}

/// Arpeggiator settings decoded from the patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArpSettings {
    pub on: bool,
    /// Step length in beats.
    pub step_beats: f32,
    pub mode: u8,
    pub octaves: u8,
    /// Gate length as a fraction of the step.
    pub gate: f32,
    pub latch: bool,
}

impl ArpSettings {
    pub const OFF: Self = Self {
        on: false,
        step_beats: 0.25,
        mode: 0,
        octaves: 1,
        gate: 0.8,
        latch: false,
    };
}

/// Everything the render path needs for one block.
#[derive(Clone, Debug)]
pub struct BlockSettings {
    pub osc: [OscSettings; 2],
    pub filter: FilterSettings,
    /// Amp, filter, pitch, mod envelopes in that order.
    pub envs: [EnvParams; 4],
    /// Signed depth for the filter, pitch, and mod envelopes, in ±1.
    pub env_amounts: [f32; 3],
    pub env_slots: [(ModTarget, f32); SOURCE_SLOTS],
    pub lfos: [LfoSettings; 3],
    pub generic: [ModSlot; GENERIC_SLOTS],
    pub arp: ArpSettings,
    pub mono: bool,
    /// Pitch bend range in semitones.
    pub pb_range: f32,
    /// Effective tempo for synced rates. The live tempo when
    /// `Control/Tempo Sync` is on, the patch's stored tempo otherwise.
    pub tempo: f32,
    pub master_level: f32,
}

impl BlockSettings {
    /// Decode the active patch. `tempo` is the live engine tempo, which
    /// may differ from the patch's stored `Control/Tempo`.
    pub fn decode(table: &ParamTable, patch: &Patch, sample_rate: f32, live_tempo: f32) -> Self {
        let ms = |v: f32| v * sample_rate / 1000.0;
        let tempo = if patch.get(table.ctrl_tempo_sync) >= 0.5 {
            live_tempo
        } else {
            patch.get(table.ctrl_tempo)
        };

        let osc = |ids: &OscIds| OscSettings {
            waveform: Waveform::from_index(patch.get(ids.waveform) as i32),
            symmetry: patch.get(ids.symmetry),
            detune: patch.get(ids.detune),
            transpose: patch.get(ids.transpose),
            start_phase: patch.get(ids.phase) / 360.0,
            key_sync: patch.get(ids.key_sync) >= 0.5,
            level: patch.get(ids.volume),
            pan: patch.get(ids.pan),
            drive: patch.get(ids.drive),
            bit_redux: patch.get(ids.bit_redux),
            fold: patch.get(ids.fold),
            unison: patch.get(ids.unison) as usize,
            unison_spread: patch.get(ids.unison_spread),
        };
        let env = |ids: &EnvIds| EnvParams {
            delay: ms(patch.get(ids.delay)),
            attack: ms(patch.get(ids.attack)),
            hold: ms(patch.get(ids.hold)),
            decay: ms(patch.get(ids.decay)),
            sustain: patch.get(ids.sustain),
            release: ms(patch.get(ids.release)),
            retrigger: patch.get(ids.mode) < 0.5,
        };
        let lfo = |ids: &LfoIds| {
            let synced = patch.get(ids.sync) >= 0.5;
            let increment = if synced {
                sync_increment(patch.get(ids.rate_note) as usize, tempo, sample_rate)
            } else {
                patch.get(ids.rate_hz) / sample_rate
            };
            let mut slots = [(ModTarget::None, 0.0); SOURCE_SLOTS];
            for (slot, &(target, amount)) in slots.iter_mut().zip(ids.slots.iter()) {
                *slot = (
                    ModTarget::from_index(patch.get(target) as i32),
                    patch.get(amount) / 100.0,
                );
            }
            LfoSettings {
                shape: LfoShape::from_index(patch.get(ids.shape) as i32),
                increment,
                key_sync: patch.get(ids.key_sync) >= 0.5,
                start_phase: patch.get(ids.phase) / 360.0,
                delay: ms(patch.get(ids.delay)),
                fade: ms(patch.get(ids.fade)),
                slots,
            }
        };

        let mut env_amounts = [0.0; 3];
        for (i, amount) in env_amounts.iter_mut().enumerate() {
            if let Some(id) = table.envs[i + 1].amount {
                *amount = patch.get(id) / 100.0;
            }
        }
        let mut env_slots = [(ModTarget::None, 0.0); SOURCE_SLOTS];
        for (slot, &(target, amount)) in env_slots.iter_mut().zip(table.env_slots.iter()) {
            *slot = (
                ModTarget::from_index(patch.get(target) as i32),
                patch.get(amount) / 100.0,
            );
        }
        let mut generic = [ModSlot::OFF; GENERIC_SLOTS];
        for (slot, &(source, target, amount)) in generic.iter_mut().zip(table.generic.iter()) {
            *slot = ModSlot {
                source: ModSource::from_index(patch.get(source) as i32),
                target: ModTarget::from_index(patch.get(target) as i32),
                amount: patch.get(amount) / 100.0,
            };
        }

        Self {
            osc: [osc(&table.osc[0]), osc(&table.osc[1])],
            filter: FilterSettings {
                kind: FilterType::from_index(patch.get(table.filter_type) as i32),
                cutoff: patch.get(table.filter_cutoff),
                resonance: patch.get(table.filter_res),
                drive: patch.get(table.filter_drive),
                key_track: patch.get(table.filter_key_track),
                four_pole: patch.get(table.filter_slope) >= 0.5,
            },
            envs: [
                env(&table.envs[ENV_AMP]),
                env(&table.envs[ENV_FILTER]),
                env(&table.envs[ENV_PITCH]),
                env(&table.envs[ENV_MOD]),
            ],
            env_amounts,
            env_slots,
            lfos: [lfo(&table.lfos[0]), lfo(&table.lfos[1]), lfo(&table.lfos[2])],
            generic,
            arp: ArpSettings {
                on: patch.get(table.arp_on) >= 0.5,
                step_beats: crate::lfo::SYNC_BEATS
                    [(patch.get(table.arp_rate_note) as usize).min(crate::lfo::SYNC_BEATS.len() - 1)],
                mode: patch.get(table.arp_mode) as u8,
                octaves: (patch.get(table.arp_octave) as u8).clamp(1, 4),
                gate: patch.get(table.arp_gate) / 100.0,
                latch: patch.get(table.arp_latch) >= 0.5,
            },
            mono: patch.get(table.ctrl_mode) >= 0.5,
            pb_range: patch.get(table.ctrl_pb_range),
            tempo,
            master_level: patch.get(table.master_level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_patch_decodes_to_sane_defaults() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let patch = Patch::init(&schema);
        let s = BlockSettings::decode(&table, &patch, 44100.0, 120.0);
        assert_eq!(s.osc[0].waveform, Waveform::Saw);
        assert!((s.osc[0].level - 0.8).abs() < 1e-6);
        assert_eq!(s.osc[1].level, 0.0);
        assert_eq!(s.filter.kind, FilterType::LowPass);
        assert!(s.filter.four_pole);
        assert!(!s.arp.on);
        assert!(!s.mono);
        assert!((s.pb_range - 2.0).abs() < 1e-6);
    }

    #[test]
    fn envelope_times_convert_to_samples() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let mut patch = Patch::init(&schema);
        let attack = schema.id("Amp Env", "Attack").unwrap();
        patch.set(&schema, attack, 250.0);
        let s = BlockSettings::decode(&table, &patch, 48000.0, 120.0);
        assert!((s.envs[ENV_AMP].attack - 12000.0).abs() < 1.0);
    }

    #[test]
    fn env_amount_scales_to_unit_range() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let mut patch = Patch::init(&schema);
        let amount = schema.id("Filter Env", "Amount").unwrap();
        patch.set(&schema, amount, -50.0);
        let s = BlockSettings::decode(&table, &patch, 44100.0, 120.0);
        assert!((s.env_amounts[0] - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn synced_lfo_follows_live_tempo() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let mut patch = Patch::init(&schema);
        let sync = schema.id("LFO 1", "Sync").unwrap();
        patch.set(&schema, sync, 1.0);
        let slow = BlockSettings::decode(&table, &patch, 44100.0, 60.0);
        let fast = BlockSettings::decode(&table, &patch, 44100.0, 120.0);
        assert!((fast.lfos[0].increment / slow.lfos[0].increment - 2.0).abs() < 1e-4);
    }

    #[test]
    fn tempo_sync_off_uses_the_patch_tempo() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let mut patch = Patch::init(&schema);
        patch.set(&schema, schema.id("Control", "Tempo Sync").unwrap(), 0.0);
        patch.set(&schema, schema.id("Control", "Tempo").unwrap(), 90.0);
        let s = BlockSettings::decode(&table, &patch, 44100.0, 140.0);
        assert!((s.tempo - 90.0).abs() < 1e-6);
    }

    #[test]
    fn generic_slots_decode_routing() {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let mut patch = Patch::init(&schema);
        patch.set(&schema, schema.lookup("Mod/Slot 3 Source").unwrap(), 6.0);
        patch.set(&schema, schema.lookup("Mod/Slot 3 Target").unwrap(), 25.0);
        patch.set(&schema, schema.lookup("Mod/Slot 3 Amount").unwrap(), 75.0);
        let s = BlockSettings::decode(&table, &patch, 44100.0, 120.0);
        assert_eq!(s.generic[2].source, ModSource::ModWheel);
        assert_eq!(s.generic[2].target, ModTarget::FilterCutoff);
        assert!((s.generic[2].amount - 0.75).abs() < 1e-6);
    }
}
