//! The engine: command handling and block rendering.
//!
//! All methods here run on the audio thread. Nothing in the render
//! path allocates, locks, or blocks; the one allocation-shaped edge,
//! patch swap, moves boxes in and out without dropping them here.

use alloc::boxed::Box;

use ar_patch::{EngineCommand, Patch, Schema};

use crate::arp::{ArpEvent, ArpEvents, Arpeggiator};
use crate::frame::Frame;
use crate::lfo::LfoState;
use crate::params::{BlockSettings, ParamTable};
use crate::pool::VoicePool;
use crate::voice::{Controls, CONTROL_INTERVAL};

pub struct Engine {
    schema: Schema,
    table: ParamTable,
    patch: Box<Patch>,
    settings: BlockSettings,
    pool: VoicePool,
    arp: Arpeggiator,
    arp_was_on: bool,
    /// Free-running LFO instances shared across voices.
    shared_lfos: [LfoState; 3],
    controls: Controls,
    sample_rate: f32,
    tempo: f32,
    peak: f32,
}

impl Engine {
    pub fn new(sample_rate: f32) -> Self {
        let schema = Schema::synth();
        let table = ParamTable::new(&schema);
        let patch = Box::new(Patch::init(&schema));
        let tempo = table.patch_tempo(&patch);
        let settings = BlockSettings::decode(&table, &patch, sample_rate, tempo);
        Self {
            schema,
            table,
            patch,
            settings,
            pool: VoicePool::new(),
            arp: Arpeggiator::new(),
            arp_was_on: false,
            shared_lfos: [LfoState::new(11), LfoState::new(23), LfoState::new(47)],
            controls: Controls::default(),
            sample_rate,
            tempo,
            peak: 0.0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Peak amplitude of the last rendered block.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    /// A patch routed a modulation cycle that had to be frozen.
    pub fn cycle_seen(&self) -> bool {
        self.pool.cycle_seen()
    }

    /// Apply one command. A replaced patch box is handed back so the
    /// caller can drop it off the audio thread.
    pub fn handle_command(&mut self, command: EngineCommand) -> Option<Box<Patch>> {
        match command {
            EngineCommand::NoteOn { note, velocity } => {
                if self.settings.arp.on {
                    self.arp.note_on(note);
                } else {
                    self.pool.note_on(note, velocity.clamp(0.0, 1.0), &self.settings);
                }
            }
            EngineCommand::NoteOff { note } => {
                if self.settings.arp.on {
                    self.arp.note_off(note);
                } else {
                    self.pool.note_off(note, &self.settings);
                }
            }
            EngineCommand::PitchBend(v) => self.controls.pitch_bend = v.clamp(-1.0, 1.0),
            EngineCommand::ModWheel(v) => self.controls.mod_wheel = v.clamp(0.0, 1.0),
            EngineCommand::Aftertouch(v) => self.controls.aftertouch = v.clamp(0.0, 1.0),
            EngineCommand::SetParam { id, value } => {
                self.patch.set(&self.schema, id, value);
            }
            EngineCommand::SetTempo(bpm) => self.tempo = bpm.clamp(20.0, 300.0),
            EngineCommand::SwapPatch(new_patch) => {
                let old = core::mem::replace(&mut self.patch, new_patch);
                self.tempo = self.table.patch_tempo(&self.patch);
                return Some(old);
            }
            EngineCommand::AllNotesOff => {
                let mut discard = ArpEvents::new();
                self.arp.reset(&mut discard);
                self.pool.all_notes_off();
            }
        }
        None
    }

    /// Render one block of audio. Voices survive patch edits and swaps;
    /// they simply pick up the new settings at the next control tick.
    /// With the `alloc_check` feature the whole block render runs under
    /// an allocation guard.
    pub fn render(&mut self, out: &mut [Frame]) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_block(out));
        #[cfg(not(feature = "alloc_check"))]
        self.render_block(out);
    }

    fn render_block(&mut self, out: &mut [Frame]) {
        self.settings = BlockSettings::decode(&self.table, &self.patch, self.sample_rate, self.tempo);

        let mut events = ArpEvents::new();
        self.arp.set_latch(self.settings.arp.latch);
        if self.settings.arp.on {
            let tempo = self.settings.tempo;
            self.arp
                .process(&self.settings.arp, tempo, self.sample_rate, out.len() as u32, &mut events);
        } else if self.arp_was_on {
            self.arp.reset(&mut events);
        }
        self.arp_was_on = self.settings.arp.on;

        for frame in out.iter_mut() {
            *frame = Frame::silence();
        }

        let mut next_event = 0usize;
        let mut start = 0usize;
        let mut peak: f32 = 0.0;
        while start < out.len() {
            // Apply events landing on this exact sample.
            while next_event < events.len() && (events[next_event].0 as usize) <= start {
                match events[next_event].1 {
                    ArpEvent::NoteOn { note, velocity } => {
                        self.pool.note_on(note, velocity, &self.settings)
                    }
                    ArpEvent::NoteOff { note } => self.pool.note_off(note, &self.settings),
                }
                next_event += 1;
            }

            // Chunks end at the next control tick or the next event,
            // whichever comes first, so note edges are sample-exact.
            let mut end = (start + CONTROL_INTERVAL).min(out.len());
            if next_event < events.len() {
                end = end.min(events[next_event].0 as usize);
            }
            let len = end - start;

            let dt = len as f32;
            for (lfo, s) in self.shared_lfos.iter_mut().zip(self.settings.lfos.iter()) {
                if !s.key_sync {
                    lfo.advance(s, dt);
                }
            }

            let chunk = &mut out[start..end];
            for voice in self.pool.voices_mut() {
                if voice.is_idle() {
                    continue;
                }
                voice.control_tick(&self.settings, &self.shared_lfos, &self.controls, self.sample_rate, dt);
                voice.render(chunk);
            }

            for frame in chunk.iter_mut() {
                frame.scale(self.settings.master_level);
                peak = peak.max(frame.peak());
            }
            start = end;
        }
        self.peak = peak;
    }
}
