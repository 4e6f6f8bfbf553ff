//! One polyphonic voice.
//!
//! A voice owns its envelope, oscillator, and filter state plus the
//! per-voice instances of any key-synced LFOs. Every control tick it
//! resolves the modulation matrix into render-ready values, then the
//! sample loop runs from that cache alone.

use ar_patch::OscDest;

use crate::envelope::EnvelopeState;
use crate::filter::{FilterCoeffs, FilterState};
use crate::frame::Frame;
use crate::lfo::LfoState;
use crate::matrix::{self, ModDeltas, ModInputs};
use crate::osc::{note_increment, unison_offsets, OscRender, OscState, MAX_UNISON};
use crate::params::{BlockSettings, ENV_AMP, ENV_FILTER, ENV_MOD, ENV_PITCH};

/// Samples per control tick.
pub const CONTROL_INTERVAL: usize = 8;

/// Full-scale pitch modulation depth in semitones.
const PITCH_MOD_SEMIS: f32 = 24.0;

/// Full-scale cutoff modulation depth in octaves.
const CUTOFF_MOD_OCTAVES: f32 = 8.0;

/// Performance controller state shared by all voices.
#[derive(Clone, Copy, Debug, Default)]
pub struct Controls {
    /// Normalized bend in [-1, 1].
    pub pitch_bend: f32,
    pub mod_wheel: f32,
    pub aftertouch: f32,
}

pub struct Voice {
    pub note: u8,
    pub velocity: f32,
    /// Monotonic note-on counter, for oldest-voice stealing.
    pub on_order: u64,
    gate_held: bool,
    envs: [EnvelopeState; 4],
    lfos: [LfoState; 3],
    oscs: [OscState; 2],
    filter: FilterState,
    deltas: ModDeltas,
    // Render cache, rebuilt each control tick.
    osc_render: [OscRender; 2],
    coeffs: FilterCoeffs,
    gain: f32,
    /// A matrix cycle was frozen at some point in this voice's life.
    pub cycle_seen: bool,
}

impl Voice {
    pub fn new(seed: u32) -> Self {
        Self {
            note: 0,
            velocity: 0.0,
            on_order: 0,
            gate_held: false,
            envs: [
                EnvelopeState::new(),
                EnvelopeState::new(),
                EnvelopeState::new(),
                EnvelopeState::new(),
            ],
            lfos: [
                LfoState::new(seed),
                LfoState::new(seed.wrapping_mul(3)),
                LfoState::new(seed.wrapping_mul(7)),
            ],
            oscs: [OscState::new(), OscState::new()],
            filter: FilterState::new(),
            deltas: ModDeltas::ZERO,
            osc_render: [EMPTY_RENDER; 2],
            coeffs: FilterCoeffs::default(),
            gain: 0.0,
            cycle_seen: false,
        }
    }

    /// Start or re-strike this voice.
    pub fn start(&mut self, note: u8, velocity: f32, order: u64, settings: &BlockSettings) {
        let restrike = self.gate_held && self.note == note;
        self.note = note;
        self.velocity = velocity;
        self.on_order = order;
        self.gate_held = true;
        for (env, params) in self.envs.iter_mut().zip(settings.envs.iter()) {
            env.gate_on(params);
        }
        for (lfo, s) in self.lfos.iter_mut().zip(settings.lfos.iter()) {
            if s.key_sync {
                lfo.trigger(s);
            }
        }
        if !restrike {
            for (osc, s) in self.oscs.iter_mut().zip(settings.osc.iter()) {
                osc.trigger(s);
            }
            self.filter.reset();
        }
    }

    pub fn release(&mut self) {
        self.gate_held = false;
        for env in &mut self.envs {
            env.gate_off();
        }
    }

    /// Silence immediately so the slot can be reused.
    pub fn kill(&mut self) {
        self.gate_held = false;
        for env in &mut self.envs {
            env.kill();
        }
    }

    pub fn is_held(&self) -> bool {
        self.gate_held
    }

    /// The amp envelope has fully died away.
    pub fn is_idle(&self) -> bool {
        self.envs[ENV_AMP].is_idle()
    }

    pub fn is_releasing(&self) -> bool {
        self.envs[ENV_AMP].is_releasing()
    }

    /// How close the amp release is to silence, for steal ordering.
    pub fn release_progress(&self, settings: &BlockSettings) -> f32 {
        self.envs[ENV_AMP].release_progress(&settings.envs[ENV_AMP])
    }

    /// Advance control-rate state by `dt` samples and rebuild the
    /// render cache. `dt` is normally one control interval but shrinks
    /// when a note event splits the chunk.
    pub fn control_tick(
        &mut self,
        settings: &BlockSettings,
        shared_lfos: &[LfoState; 3],
        controls: &Controls,
        sample_rate: f32,
        dt: f32,
    ) {
        for (env, params) in self.envs.iter_mut().zip(settings.envs.iter()) {
            env.advance(params, dt);
        }
        for (lfo, s) in self.lfos.iter_mut().zip(settings.lfos.iter()) {
            if s.key_sync {
                lfo.advance(s, dt);
            }
        }

        let mut lfo_values = [0.0f32; 3];
        for (i, value) in lfo_values.iter_mut().enumerate() {
            let state = if settings.lfos[i].key_sync { &self.lfos[i] } else { &shared_lfos[i] };
            *value = state.value(&settings.lfos[i]);
        }
        let inputs = ModInputs {
            lfo: lfo_values,
            mod_env: self.envs[ENV_MOD].value() * settings.env_amounts[ENV_MOD - 1],
            pitch_bend: controls.pitch_bend,
            mod_wheel: controls.mod_wheel,
            aftertouch: controls.aftertouch,
            velocity: self.velocity,
            key_track: (self.note as f32 - 64.0) / 64.0,
        };
        matrix::resolve(
            &mut self.deltas,
            &inputs,
            &settings.generic,
            &settings.env_slots,
            &settings.lfos,
        );
        if self.deltas.cycle_blocked {
            self.cycle_seen = true;
        }

        let pitch_env =
            self.envs[ENV_PITCH].value() * settings.env_amounts[ENV_PITCH - 1] * PITCH_MOD_SEMIS;
        let bend = controls.pitch_bend * settings.pb_range;
        for i in 0..2 {
            let s = &settings.osc[i];
            let d = &self.deltas;
            let pitch = self.note as f32
                + s.transpose
                + bend
                + pitch_env
                + d.osc(i, OscDest::Pitch) * PITCH_MOD_SEMIS;
            let detune = s.detune + d.osc(i, OscDest::Detune) * 100.0;
            let unison = s.unison.clamp(1, MAX_UNISON);
            let mut offsets = [0.0f32; MAX_UNISON];
            unison_offsets(unison, s.unison_spread, &mut offsets);
            let mut increments = [0.0f32; MAX_UNISON];
            for (inc, offset) in increments.iter_mut().zip(offsets.iter()).take(unison) {
                *inc = note_increment(pitch, 0.0, detune + offset, sample_rate);
            }
            self.osc_render[i] = OscRender {
                increments,
                unison,
                waveform: s.waveform,
                symmetry: (s.symmetry + d.osc(i, OscDest::Symmetry)).clamp(0.0, 1.0),
                drive: (s.drive + d.osc(i, OscDest::Drive)).clamp(0.0, 1.0),
                bit_redux: (s.bit_redux + d.osc(i, OscDest::BitRedux)).clamp(0.0, 1.0),
                fold: (s.fold + d.osc(i, OscDest::Fold)).clamp(0.0, 1.0),
                level: (s.level + d.osc(i, OscDest::Level)).clamp(0.0, 1.0),
                pan: (s.pan + d.osc(i, OscDest::Pan)).clamp(-1.0, 1.0),
            };
        }

        let f = &settings.filter;
        let key_octaves = f.key_track * (self.note as f32 - 60.0) / 12.0;
        let env_octaves = self.envs[ENV_FILTER].value()
            * settings.env_amounts[ENV_FILTER - 1]
            * CUTOFF_MOD_OCTAVES;
        let mod_octaves = self.deltas.cutoff() * CUTOFF_MOD_OCTAVES;
        let cutoff =
            (f.cutoff * libm::exp2f(key_octaves + env_octaves + mod_octaves)).clamp(20.0, 20000.0);
        let resonance = (f.resonance + self.deltas.resonance()).clamp(0.0, 1.0);
        self.coeffs =
            FilterCoeffs::compute(f.kind, cutoff, resonance, f.drive, f.four_pole, sample_rate);

        self.gain = self.envs[ENV_AMP].value() * self.velocity;
    }

    /// Render `out.len()` samples from the current control-tick cache,
    /// mixing into the buffer.
    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out {
            let mut sample = self.oscs[0].render(&self.osc_render[0]);
            sample.mix(self.oscs[1].render(&self.osc_render[1]));
            let (l, r) = self.filter.process(&self.coeffs, sample.left, sample.right);
            frame.left += l * self.gain;
            frame.right += r * self.gain;
        }
    }
}

const EMPTY_RENDER: OscRender = OscRender {
    increments: [0.0; MAX_UNISON],
    unison: 1,
    waveform: crate::osc::Waveform::Saw,
    symmetry: 0.5,
    drive: 0.0,
    bit_redux: 0.0,
    fold: 0.0,
    level: 0.0,
    pan: 0.0,
};

#[cfg(test)]
mod tests {
    use super::*;
    use ar_patch::{Patch, Schema};

    use crate::params::ParamTable;

    const SR: f32 = 44100.0;

    fn defaults() -> BlockSettings {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        BlockSettings::decode(&table, &Patch::init(&schema), SR, 120.0)
    }

    fn shared() -> [LfoState; 3] {
        [LfoState::new(1), LfoState::new(2), LfoState::new(3)]
    }

    fn render_ticks(voice: &mut Voice, settings: &BlockSettings, ticks: usize) -> f32 {
        let shared = shared();
        let controls = Controls::default();
        let mut peak: f32 = 0.0;
        for _ in 0..ticks {
            voice.control_tick(settings, &shared, &controls, SR, CONTROL_INTERVAL as f32);
            let mut buf = [Frame::silence(); CONTROL_INTERVAL];
            voice.render(&mut buf);
            for f in &buf {
                peak = peak.max(f.peak());
            }
        }
        peak
    }

    #[test]
    fn started_voice_produces_audio() {
        let settings = defaults();
        let mut voice = Voice::new(1);
        voice.start(60, 1.0, 1, &settings);
        let peak = render_ticks(&mut voice, &settings, 200);
        assert!(peak > 0.05, "voice stayed silent: {peak}");
    }

    #[test]
    fn released_voice_decays_to_idle() {
        let mut settings = defaults();
        settings.envs[ENV_AMP].release = 100.0;
        let mut voice = Voice::new(1);
        voice.start(60, 1.0, 1, &settings);
        render_ticks(&mut voice, &settings, 10);
        voice.release();
        assert!(voice.is_releasing());
        render_ticks(&mut voice, &settings, 20);
        assert!(voice.is_idle());
        let peak = render_ticks(&mut voice, &settings, 10);
        assert!(peak < 1e-3);
    }

    #[test]
    fn velocity_scales_output() {
        let settings = defaults();
        let mut soft = Voice::new(1);
        let mut hard = Voice::new(1);
        soft.start(60, 0.25, 1, &settings);
        hard.start(60, 1.0, 1, &settings);
        let soft_peak = render_ticks(&mut soft, &settings, 100);
        let hard_peak = render_ticks(&mut hard, &settings, 100);
        assert!(hard_peak > soft_peak * 2.0);
    }

    #[test]
    fn pitch_bend_raises_pitch_not_level() {
        let settings = defaults();
        let shared = shared();
        let mut voice = Voice::new(1);
        voice.start(69, 1.0, 1, &settings);
        let controls = Controls { pitch_bend: 1.0, ..Default::default() };
        voice.control_tick(&settings, &shared, &controls, SR, CONTROL_INTERVAL as f32);
        // Bend range defaults to 2 semitones.
        let expected = note_increment(71.0, 0.0, 0.0, SR);
        assert!((voice.osc_render[0].increments[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn matrix_route_moves_cutoff() {
        let mut settings = defaults();
        settings.generic[0] = ar_patch::ModSlot {
            source: ar_patch::ModSource::ModWheel,
            target: ar_patch::ModTarget::FilterCutoff,
            amount: -1.0,
        };
        settings.filter.cutoff = 2000.0;
        let shared = shared();
        let mut voice = Voice::new(1);
        voice.start(60, 1.0, 1, &settings);

        let open = Controls::default();
        voice.control_tick(&settings, &shared, &open, SR, CONTROL_INTERVAL as f32);
        let open_coeffs = voice.coeffs;

        let closed = Controls { mod_wheel: 1.0, ..Default::default() };
        voice.control_tick(&settings, &shared, &closed, SR, CONTROL_INTERVAL as f32);
        // Wheel full down at -100% pushes cutoff to the floor.
        assert_ne!(voice.coeffs, open_coeffs);
    }

    #[test]
    fn kill_silences_instantly() {
        let settings = defaults();
        let mut voice = Voice::new(1);
        voice.start(60, 1.0, 1, &settings);
        render_ticks(&mut voice, &settings, 10);
        voice.kill();
        assert!(voice.is_idle());
        let peak = render_ticks(&mut voice, &settings, 5);
        assert!(peak < 1e-6);
    }
}
