//! Dual wavetable-style oscillators with shaping stages.
//!
//! Each oscillator runs up to eight unison copies of a base waveform,
//! then passes the sum through symmetry warp, drive, bit reduction,
//! and wavefolding. Output is a stereo frame after level and pan.

use crate::frame::Frame;

/// Maximum unison copies per oscillator.
pub const MAX_UNISON: usize = 8;

/// Base waveform. Symmetry warping is applied to the phase before the
/// shape function, so 0.5 is the neutral setting for every shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

impl Waveform {
    pub fn from_index(index: i32) -> Self {
        match index {
            0 => Self::Sine,
            2 => Self::Square,
            3 => Self::Triangle,
            _ => Self::Saw,
        }
    }
}

/// Decoded per-block oscillator settings. Fields the matrix can move
/// hold the base value; the voice applies deltas each control tick.
#[derive(Clone, Copy, Debug)]
pub struct OscSettings {
    pub waveform: Waveform,
    pub symmetry: f32,
    /// Detune in cents.
    pub detune: f32,
    /// Transpose in semitones.
    pub transpose: f32,
    /// Start phase in cycles [0, 1).
    pub start_phase: f32,
    pub key_sync: bool,
    pub level: f32,
    /// Pan in [-1, 1].
    pub pan: f32,
    pub drive: f32,
    pub bit_redux: f32,
    pub fold: f32,
    pub unison: usize,
    pub unison_spread: f32,
}

impl OscSettings {
    pub const OFF: Self = Self {
        waveform: Waveform::Saw,
        symmetry: 0.5,
        detune: 0.0,
        transpose: 0.0,
        start_phase: 0.0,
        key_sync: true,
        level: 0.0,
        pan: 0.0,
        drive: 0.0,
        bit_redux: 0.0,
        fold: 0.0,
        unison: 1,
        unison_spread: 0.0,
    };
}

/// Per-control-tick values after modulation, ready to render with.
#[derive(Clone, Copy, Debug)]
pub struct OscRender {
    /// Phase increment per sample for each unison copy.
    pub increments: [f32; MAX_UNISON],
    pub unison: usize,
    pub waveform: Waveform,
    pub symmetry: f32,
    pub drive: f32,
    pub bit_redux: f32,
    pub fold: f32,
    pub level: f32,
    pub pan: f32,
}

/// Runtime phase state for one oscillator instance.
#[derive(Clone, Debug)]
pub struct OscState {
    phases: [f32; MAX_UNISON],
}

impl OscState {
    pub fn new() -> Self {
        Self { phases: [0.0; MAX_UNISON] }
    }

    /// Reset phases for a new note. Without key sync the phases are
    /// left wherever the last note put them.
    pub fn trigger(&mut self, settings: &OscSettings) {
        if !settings.key_sync {
            return;
        }
        for (i, phase) in self.phases.iter_mut().enumerate() {
            // Stagger unison copies so they do not start in lockstep.
            *phase = settings.start_phase + i as f32 * 0.37;
            *phase -= libm::floorf(*phase);
        }
    }

    /// Render one sample and advance the phases.
    pub fn render(&mut self, r: &OscRender) -> Frame {
        let mut sum = 0.0;
        let copies = r.unison.clamp(1, MAX_UNISON);
        for i in 0..copies {
            let warped = warp_phase(self.phases[i], r.symmetry);
            sum += shape(r.waveform, warped);
            self.phases[i] += r.increments[i];
            if self.phases[i] >= 1.0 {
                self.phases[i] -= 1.0;
            }
        }
        // Keep perceived level steady as copies are added.
        let mut value = sum / libm::sqrtf(copies as f32);

        if r.drive > 0.0 {
            value = libm::tanhf(value * (1.0 + r.drive * 4.0));
        }
        if r.bit_redux > 0.0 {
            // 16 steps down to 2 as the control rises.
            let steps = 2.0 + (1.0 - r.bit_redux) * 14.0;
            value = libm::roundf(value * steps) / steps;
        }
        if r.fold > 0.0 {
            value = fold(value * (1.0 + r.fold * 3.0));
        }

        let gain = r.level;
        let pan = r.pan.clamp(-1.0, 1.0);
        Frame {
            left: value * gain * (1.0 - pan).min(1.0),
            right: value * gain * (1.0 + pan).min(1.0),
        }
    }
}

impl Default for OscState {
    fn default() -> Self {
        Self::new()
    }
}

/// Symmetry warp: remap phase so the waveform's midpoint lands at
/// `symmetry` instead of 0.5. Neutral at 0.5, PWM-like at the extremes.
fn warp_phase(phase: f32, symmetry: f32) -> f32 {
    let s = symmetry.clamp(0.01, 0.99);
    if phase < s {
        phase / (2.0 * s)
    } else {
        0.5 + (phase - s) / (2.0 * (1.0 - s))
    }
}

fn shape(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => libm::sinf(phase * core::f32::consts::TAU),
        Waveform::Saw => 2.0 * phase - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => {
            if phase < 0.5 {
                4.0 * phase - 1.0
            } else {
                3.0 - 4.0 * phase
            }
        }
    }
}

/// Reflect values beyond the unit range back inside it.
fn fold(mut value: f32) -> f32 {
    while value > 1.0 || value < -1.0 {
        if value > 1.0 {
            value = 2.0 - value;
        } else {
            value = -2.0 - value;
        }
    }
    value
}

/// Phase increment per sample for a MIDI note with transpose (semitones)
/// and detune (cents) applied.
pub fn note_increment(note: f32, transpose: f32, detune_cents: f32, sample_rate: f32) -> f32 {
    let semis = note + transpose + detune_cents / 100.0;
    let freq = 440.0 * libm::powf(2.0, (semis - 69.0) / 12.0);
    freq / sample_rate
}

/// Detune offsets in cents for unison copies, spread symmetrically.
pub fn unison_offsets(copies: usize, spread: f32, out: &mut [f32; MAX_UNISON]) {
    let copies = copies.clamp(1, MAX_UNISON);
    if copies == 1 {
        out[0] = 0.0;
        return;
    }
    // Full spread is +/-50 cents across the stack.
    for (i, slot) in out.iter_mut().take(copies).enumerate() {
        let position = i as f32 / (copies - 1) as f32 * 2.0 - 1.0;
        *slot = position * spread * 50.0;
    }
}
