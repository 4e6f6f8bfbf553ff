//! Low-frequency oscillators.
//!
//! Three LFOs, each with six shapes, optional tempo sync, key sync,
//! a start delay, and a fade-in. Key-synced LFOs run per voice;
//! free-running ones live in the engine and are shared by all voices.

use ar_patch::{ModTarget, SOURCE_SLOTS};

/// LFO waveform. Output is in [-1, 1] for every shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LfoShape {
    Sine,
    Triangle,
    /// Rising sawtooth.
    Saw,
    Square,
    SampleHold,
    /// Like sample-and-hold, but interpolated between steps.
    Random,
}

impl LfoShape {
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Triangle,
            2 => Self::Saw,
            3 => Self::Square,
            4 => Self::SampleHold,
            5 => Self::Random,
            _ => Self::Sine,
        }
    }
}

/// Decoded per-block settings for one LFO.
#[derive(Clone, Copy, Debug)]
pub struct LfoSettings {
    pub shape: LfoShape,
    /// Phase increment per sample (cycles).
    pub increment: f32,
    pub key_sync: bool,
    /// Start phase in cycles [0, 1).
    pub start_phase: f32,
    /// Onset delay in samples.
    pub delay: f32,
    /// Fade-in length in samples, counted after the delay.
    pub fade: f32,
    /// Dedicated routing slots: target plus base amount (already ±1).
    pub slots: [(ModTarget, f32); SOURCE_SLOTS],
}

impl LfoSettings {
    pub const OFF: Self = Self {
        shape: LfoShape::Sine,
        increment: 0.0,
        key_sync: true,
        start_phase: 0.0,
        delay: 0.0,
        fade: 0.0,
        slots: [(ModTarget::None, 0.0); SOURCE_SLOTS],
    };
}

/// Runtime state for one LFO instance.
#[derive(Clone, Debug)]
pub struct LfoState {
    phase: f32,
    /// Samples of delay still to run.
    delay_remaining: f32,
    /// Samples elapsed since the delay ended.
    fade_elapsed: f32,
    /// Current and previous sample-and-hold levels.
    held: f32,
    prev_held: f32,
    rng: u32,
    /// Value captured at trigger, output while the delay runs.
    start_value: f32,
}

impl LfoState {
    pub fn new(seed: u32) -> Self {
        let mut s = Self {
            phase: 0.0,
            delay_remaining: 0.0,
            fade_elapsed: 0.0,
            held: 0.0,
            prev_held: 0.0,
            rng: if seed == 0 { 0x9e37_79b9 } else { seed },
            start_value: 0.0,
        };
        s.held = s.next_random();
        s.prev_held = s.held;
        s
    }

    /// Reset for a new note (key-synced LFOs only).
    pub fn trigger(&mut self, settings: &LfoSettings) {
        self.phase = settings.start_phase;
        self.delay_remaining = settings.delay;
        self.fade_elapsed = 0.0;
        self.prev_held = self.held;
        self.held = self.next_random();
        self.start_value = shape_value(settings.shape, self.phase, self.held, self.prev_held);
    }

    fn next_random(&mut self) -> f32 {
        // xorshift32; deterministic, no allocator, good enough for S&H.
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    /// Advance by `dt` samples.
    pub fn advance(&mut self, settings: &LfoSettings, dt: f32) {
        let mut next = self.phase + settings.increment * dt;
        if next >= 1.0 {
            next -= libm::floorf(next);
            self.prev_held = self.held;
            self.held = self.next_random();
        }
        self.phase = next;

        if self.delay_remaining > 0.0 {
            self.delay_remaining -= dt;
        } else {
            self.fade_elapsed += dt;
        }
    }

    /// Current output in [-1, 1], with delay hold and fade-in applied.
    pub fn value(&self, settings: &LfoSettings) -> f32 {
        if self.delay_remaining > 0.0 {
            return self.start_value;
        }
        let raw = shape_value(settings.shape, self.phase, self.held, self.prev_held);
        if settings.fade > 0.0 && self.fade_elapsed < settings.fade {
            raw * (self.fade_elapsed / settings.fade)
        } else {
            raw
        }
    }
}

fn shape_value(shape: LfoShape, phase: f32, held: f32, prev_held: f32) -> f32 {
    match shape {
        LfoShape::Sine => libm::sinf(phase * core::f32::consts::TAU),
        LfoShape::Triangle => {
            if phase < 0.5 {
                -1.0 + 4.0 * phase
            } else {
                3.0 - 4.0 * phase
            }
        }
        LfoShape::Saw => -1.0 + 2.0 * phase,
        LfoShape::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        LfoShape::SampleHold => held,
        LfoShape::Random => prev_held + (held - prev_held) * phase,
    }
}

/// Note-length divisors for tempo sync, 1/64 through 4/1, in beats.
/// Index order matches the `Rate Note` parameter.
pub const SYNC_BEATS: [f32; 9] = [0.0625, 0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];

/// Phase increment per sample for a synced rate.
pub fn sync_increment(rate_note: usize, tempo_bpm: f32, sample_rate: f32) -> f32 {
    let beats = SYNC_BEATS[rate_note.min(SYNC_BEATS.len() - 1)];
    let seconds = beats * 60.0 / tempo_bpm;
    1.0 / (seconds * sample_rate)
}
