//! Voice allocation and lifecycle.
//!
//! A fixed set of voices, allocated once. Note-on reuses a held voice
//! playing the same note, then a silent one, then steals: first the
//! releasing voice closest to silence, otherwise the oldest held one.
//! Mono mode pins everything to voice zero and keeps a held-note stack
//! so releasing the top key falls back to the one underneath.

use heapless::Vec as FixedVec;

use crate::params::BlockSettings;
use crate::voice::Voice;

/// Number of voices in the pool.
pub const MAX_VOICES: usize = 16;

pub struct VoicePool {
    voices: alloc::vec::Vec<Voice>,
    /// Monotonic note-on counter for age ordering.
    counter: u64,
    /// Keys currently down in mono mode, press order.
    mono_held: FixedVec<(u8, f32), MAX_VOICES>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self {
            voices: (0..MAX_VOICES).map(|i| Voice::new(i as u32 + 1)).collect(),
            counter: 0,
            mono_held: FixedVec::new(),
        }
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices currently making sound.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_idle()).count()
    }

    pub fn note_on(&mut self, note: u8, velocity: f32, settings: &BlockSettings) {
        self.counter += 1;
        let order = self.counter;
        if settings.mono {
            self.mono_held.retain(|&(n, _)| n != note);
            let _ = self.mono_held.push((note, velocity));
            self.voices[0].start(note, velocity, order, settings);
            return;
        }
        let index = self.find_slot(note, settings);
        self.voices[index].start(note, velocity, order, settings);
    }

    fn find_slot(&self, note: u8, settings: &BlockSettings) -> usize {
        // Same note still held: re-strike in place.
        if let Some(i) = self.voices.iter().position(|v| v.is_held() && v.note == note) {
            return i;
        }
        if let Some(i) = self.voices.iter().position(|v| v.is_idle()) {
            return i;
        }
        // Steal the releasing voice nearest to silence.
        let releasing = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_releasing())
            .max_by(|(_, a), (_, b)| {
                a.release_progress(settings)
                    .partial_cmp(&b.release_progress(settings))
                    .unwrap_or(core::cmp::Ordering::Equal)
            });
        if let Some((i, _)) = releasing {
            return i;
        }
        // All voices held: steal the oldest.
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.on_order)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn note_off(&mut self, note: u8, settings: &BlockSettings) {
        if settings.mono {
            self.mono_held.retain(|&(n, _)| n != note);
            if self.voices[0].is_held() && self.voices[0].note == note {
                if let Some(&(prev, vel)) = self.mono_held.last() {
                    self.counter += 1;
                    let order = self.counter;
                    self.voices[0].start(prev, vel, order, settings);
                } else {
                    self.voices[0].release();
                }
            }
            return;
        }
        for voice in &mut self.voices {
            if voice.is_held() && voice.note == note {
                voice.release();
            }
        }
    }

    /// Release every held voice and forget the mono stack.
    pub fn all_notes_off(&mut self) {
        self.mono_held.clear();
        for voice in &mut self.voices {
            if voice.is_held() {
                voice.release();
            }
        }
    }

    /// Any voice that has seen a frozen matrix cycle.
    pub fn cycle_seen(&self) -> bool {
        self.voices.iter().any(|v| v.cycle_seen)
    }
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new()
    }
}
