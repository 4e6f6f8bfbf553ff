//! Tempo-synced arpeggiator.
//!
//! Holds the incoming note set and emits gated note events at step
//! boundaries, with sample offsets into the current block. All storage
//! is fixed-capacity; rebuilding the sequence each block keeps mode
//! and octave edits live without bookkeeping.

use heapless::Vec;

use crate::params::ArpSettings;

/// Most keys the arp will track at once.
pub const MAX_HELD: usize = 16;

/// Held notes times four octaves.
const MAX_SEQ: usize = MAX_HELD * 4;

/// Most events one block can carry.
pub const MAX_EVENTS: usize = 32;

/// Velocity for generated notes.
const ARP_VELOCITY: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArpEvent {
    NoteOn { note: u8, velocity: f32 },
    NoteOff { note: u8 },
}

/// Events for one block, each tagged with its sample offset.
pub type ArpEvents = Vec<(u32, ArpEvent), MAX_EVENTS>;

/// Step ordering, matching the `Arp/Mode` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpMode {
    Up,
    Down,
    UpDown,
    Random,
    AsPlayed,
}

impl ArpMode {
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Down,
            2 => Self::UpDown,
            3 => Self::Random,
            4 => Self::AsPlayed,
            _ => Self::Up,
        }
    }
}

pub struct Arpeggiator {
    /// Keys physically down, in press order.
    physical: Vec<u8, MAX_HELD>,
    /// Notes the arp plays from. Differs from `physical` when latched.
    held: Vec<u8, MAX_HELD>,
    latch: bool,
    step: usize,
    /// Scanning downward in up-down mode.
    descending: bool,
    /// Samples until the next step fires. Zero means fire immediately.
    to_step: u32,
    /// Samples until the sounding note gates off.
    to_gate_off: Option<u32>,
    sounding: Option<u8>,
    rng: u32,
}

impl Arpeggiator {
    pub fn new() -> Self {
        Self {
            physical: Vec::new(),
            held: Vec::new(),
            latch: false,
            step: 0,
            descending: false,
            to_step: 0,
            to_gate_off: None,
            sounding: None,
            rng: 0x1357_9bdf,
        }
    }

    /// Feed a key press. With latch on, a press into an empty keyboard
    /// starts a fresh latched set.
    pub fn note_on(&mut self, note: u8) {
        if self.latch && self.physical.is_empty() {
            self.held.clear();
        }
        let was_empty = self.held.is_empty();
        if !self.physical.contains(&note) {
            let _ = self.physical.push(note);
        }
        if !self.held.contains(&note) {
            let _ = self.held.push(note);
        }
        if was_empty {
            // First key down: fire the first step right away.
            self.step = 0;
            self.descending = false;
            self.to_step = 0;
            self.to_gate_off = None;
        }
    }

    /// Feed a key release. Latched notes keep sounding.
    pub fn note_off(&mut self, note: u8) {
        self.physical.retain(|&n| n != note);
        if !self.latch {
            self.held.retain(|&n| n != note);
        }
    }

    /// Track the patch's latch switch. Turning latch off drops every
    /// note that is no longer physically held.
    pub fn set_latch(&mut self, latch: bool) {
        if self.latch && !latch {
            let physical = self.physical.clone();
            self.held.retain(|n| physical.contains(n));
        }
        self.latch = latch;
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Silence and forget everything.
    pub fn reset(&mut self, events: &mut ArpEvents) {
        if let Some(note) = self.sounding.take() {
            let _ = events.push((0, ArpEvent::NoteOff { note }));
        }
        self.physical.clear();
        self.held.clear();
        self.to_gate_off = None;
        self.to_step = 0;
        self.step = 0;
    }

    /// Generate this block's events. `tempo` is in BPM.
    pub fn process(
        &mut self,
        settings: &ArpSettings,
        tempo: f32,
        sample_rate: f32,
        block_len: u32,
        events: &mut ArpEvents,
    ) {
        let mut sequence: Vec<u8, MAX_SEQ> = Vec::new();
        build_sequence(&self.held, ArpMode::from_index(settings.mode), settings.octaves, &mut sequence);

        if sequence.is_empty() {
            if let Some(note) = self.sounding.take() {
                let _ = events.push((0, ArpEvent::NoteOff { note }));
            }
            self.to_gate_off = None;
            self.to_step = 0;
            return;
        }

        let step_samples = ((settings.step_beats * 60.0 / tempo) * sample_rate) as u32;
        let step_samples = step_samples.max(1);
        let gate_samples = ((step_samples as f32 * settings.gate.clamp(0.01, 1.0)) as u32).max(1);

        let mut t = 0u32;
        while t < block_len {
            let until_gate = self.to_gate_off.unwrap_or(u32::MAX);
            let next = self.to_step.min(until_gate);
            if next >= block_len - t {
                let elapsed = block_len - t;
                self.to_step -= elapsed;
                if let Some(g) = &mut self.to_gate_off {
                    *g -= elapsed;
                }
                break;
            }

            t += next;
            self.to_step -= next;
            if let Some(g) = &mut self.to_gate_off {
                *g -= next;
            }

            // Gate off strictly before the next note on at the same offset.
            if self.to_gate_off == Some(0) {
                if let Some(note) = self.sounding.take() {
                    let _ = events.push((t, ArpEvent::NoteOff { note }));
                }
                self.to_gate_off = None;
            }
            if self.to_step == 0 {
                if let Some(note) = self.sounding.take() {
                    // Full-length gates hand over at the step boundary.
                    let _ = events.push((t, ArpEvent::NoteOff { note }));
                }
                let note = self.pick(&sequence, ArpMode::from_index(settings.mode));
                let _ = events.push((t, ArpEvent::NoteOn { note, velocity: ARP_VELOCITY }));
                self.sounding = Some(note);
                self.to_step = step_samples;
                self.to_gate_off = (gate_samples < step_samples).then_some(gate_samples);
            }
        }
    }

    fn pick(&mut self, sequence: &[u8], mode: ArpMode) -> u8 {
        match mode {
            ArpMode::Random => {
                let mut x = self.rng;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                self.rng = x;
                sequence[x as usize % sequence.len()]
            }
            ArpMode::UpDown => {
                if self.step >= sequence.len() {
                    self.step = 0;
                    self.descending = false;
                }
                let index = if self.descending {
                    sequence.len() - 1 - self.step
                } else {
                    self.step
                };
                self.step += 1;
                if self.step >= sequence.len() {
                    self.step = if sequence.len() > 1 { 1 } else { 0 };
                    self.descending = !self.descending;
                }
                sequence[index]
            }
            _ => {
                if self.step >= sequence.len() {
                    self.step = 0;
                }
                let note = sequence[self.step];
                self.step = (self.step + 1) % sequence.len();
                note
            }
        }
    }
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self::new()
    }
}

fn build_sequence(held: &[u8], mode: ArpMode, octaves: u8, out: &mut Vec<u8, MAX_SEQ>) {
    let mut base: Vec<u8, MAX_HELD> = Vec::new();
    for &n in held {
        let _ = base.push(n);
    }
    match mode {
        ArpMode::AsPlayed => {}
        ArpMode::Down => base.sort_unstable_by(|a, b| b.cmp(a)),
        _ => base.sort_unstable(),
    }
    for octave in 0..octaves.max(1) {
        for &n in &base {
            let shifted = n as u16 + 12 * octave as u16;
            if shifted <= 127 {
                let _ = out.push(shifted as u8);
            }
        }
    }
    // Down mode replicates octaves downward from the top.
    if mode == ArpMode::Down && octaves > 1 {
        out.clear();
        for octave in (0..octaves).rev() {
            for &n in &base {
                let shifted = n as u16 + 12 * octave as u16;
                if shifted <= 127 {
                    let _ = out.push(shifted as u8);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0; // 1 sample per ms keeps offsets readable

    fn settings(mode: u8, gate: f32) -> ArpSettings {
        ArpSettings { on: true, step_beats: 1.0, mode, octaves: 1, gate, latch: false }
    }

    fn collect(arp: &mut Arpeggiator, s: &ArpSettings, blocks: usize, block_len: u32) -> alloc::vec::Vec<(u32, ArpEvent)> {
        let mut all = alloc::vec::Vec::new();
        for block in 0..blocks {
            let mut events = ArpEvents::new();
            arp.process(s, 120.0, SR, block_len, &mut events);
            for (offset, e) in events {
                all.push((block as u32 * block_len + offset, e));
            }
        }
        all
    }

    #[test]
    fn up_mode_with_half_gate() {
        // Quarter notes at 120 BPM: 500 ms steps, 250 ms gates.
        let mut arp = Arpeggiator::new();
        for n in [60, 64, 67] {
            arp.note_on(n);
        }
        let events = collect(&mut arp, &settings(0, 0.5), 12, 100);
        assert_eq!(events[0], (0, ArpEvent::NoteOn { note: 60, velocity: 0.8 }));
        assert_eq!(events[1], (250, ArpEvent::NoteOff { note: 60 }));
        assert_eq!(events[2], (500, ArpEvent::NoteOn { note: 64, velocity: 0.8 }));
        assert_eq!(events[3], (750, ArpEvent::NoteOff { note: 64 }));
        assert_eq!(events[4], (1000, ArpEvent::NoteOn { note: 67, velocity: 0.8 }));
    }

    #[test]
    fn up_cycles_back_to_root() {
        let mut arp = Arpeggiator::new();
        for n in [60, 64, 67] {
            arp.note_on(n);
        }
        let events = collect(&mut arp, &settings(0, 0.5), 20, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(&ons[..4], &[60, 64, 67, 60]);
    }

    #[test]
    fn down_mode_descends() {
        let mut arp = Arpeggiator::new();
        for n in [60, 67, 64] {
            arp.note_on(n);
        }
        let events = collect(&mut arp, &settings(1, 0.5), 15, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(&ons[..3], &[67, 64, 60]);
    }

    #[test]
    fn updown_does_not_repeat_endpoints() {
        let mut arp = Arpeggiator::new();
        for n in [60, 64, 67] {
            arp.note_on(n);
        }
        let events = collect(&mut arp, &settings(2, 0.5), 40, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(&ons[..6], &[60, 64, 67, 64, 60, 64]);
    }

    #[test]
    fn as_played_keeps_press_order() {
        let mut arp = Arpeggiator::new();
        for n in [67, 60, 64] {
            arp.note_on(n);
        }
        let events = collect(&mut arp, &settings(4, 0.5), 15, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(&ons[..3], &[67, 60, 64]);
    }

    #[test]
    fn octave_replication_extends_sequence() {
        let mut arp = Arpeggiator::new();
        arp.note_on(60);
        let mut s = settings(0, 0.5);
        s.octaves = 2;
        let events = collect(&mut arp, &s, 12, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(&ons[..3], &[60, 72, 60]);
    }

    #[test]
    fn releasing_all_keys_stops_the_note() {
        let mut arp = Arpeggiator::new();
        arp.note_on(60);
        let mut events = ArpEvents::new();
        arp.process(&settings(0, 1.0), 120.0, SR, 100, &mut events);
        assert!(matches!(events[0], (0, ArpEvent::NoteOn { note: 60, .. })));

        arp.note_off(60);
        let mut events = ArpEvents::new();
        arp.process(&settings(0, 1.0), 120.0, SR, 100, &mut events);
        assert_eq!(events[0], (0, ArpEvent::NoteOff { note: 60 }));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn latch_survives_key_release() {
        let mut arp = Arpeggiator::new();
        arp.set_latch(true);
        arp.note_on(60);
        arp.note_off(60);
        assert!(!arp.is_empty());

        // Disabling latch with no keys down clears the set.
        arp.set_latch(false);
        assert!(arp.is_empty());
    }

    #[test]
    fn latched_press_on_empty_keyboard_starts_fresh() {
        let mut arp = Arpeggiator::new();
        arp.set_latch(true);
        arp.note_on(60);
        arp.note_off(60);
        arp.note_on(64);
        let events = collect(&mut arp, &settings(0, 0.5), 12, 100);
        let ons: alloc::vec::Vec<u8> = events
            .iter()
            .filter_map(|(_, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect();
        assert!(ons.iter().all(|&n| n == 64));
    }

    #[test]
    fn full_gate_hands_over_at_step_boundary() {
        let mut arp = Arpeggiator::new();
        arp.note_on(60);
        arp.note_on(64);
        let events = collect(&mut arp, &settings(0, 1.0), 12, 100);
        assert_eq!(events[0], (0, ArpEvent::NoteOn { note: 60, velocity: 0.8 }));
        assert_eq!(events[1], (500, ArpEvent::NoteOff { note: 60 }));
        assert_eq!(events[2], (500, ArpEvent::NoteOn { note: 64, velocity: 0.8 }));
    }
}
