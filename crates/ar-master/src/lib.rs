//! Headless controller for the Argon synth.
//!
//! Owns the patch bank and the edit buffer, spawns the audio thread,
//! and talks to the engine over SPSC rings: commands go in at block
//! boundaries, replaced patch boxes come back out so their memory is
//! freed on this side. A small atomic snapshot carries meters and a
//! parameter mirror the other way.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ar_audio::{AudioOutput, CpalOutput};
use ar_engine::Engine;
use ar_patch::{EngineCommand, Patch, PatchBank, Schema};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

// Re-export common types so callers don't need the inner crates directly.
pub use ar_engine::Frame;
pub use ar_formats::{frames_to_wav, write_wav, BankError, BankWarning};
pub use ar_patch::BANK_SLOTS;

/// Command ring capacity. A burst bigger than this drops commands.
const COMMAND_CAPACITY: usize = 256;

/// In-flight patch boxes. Sized to the command ring: each queued
/// command yields at most one replaced box, and `send` drains this
/// ring before pushing, so it can never fill ahead of the consumer.
const RECLAIM_CAPACITY: usize = COMMAND_CAPACITY;

/// Frames per render block on the audio thread.
const BLOCK_FRAMES: usize = 256;

/// State published by the audio thread: meters every block, plus a
/// mirror of the engine's current parameter values (f32 bit patterns
/// in atomics) refreshed at a bounded rate. A UI can read all of it
/// freely without touching the engine.
pub struct Snapshot {
    peak_bits: AtomicU32,
    voices: AtomicU32,
    cycle: AtomicBool,
    params: Vec<AtomicU32>,
}

impl Snapshot {
    fn new(param_count: usize) -> Self {
        Self {
            peak_bits: AtomicU32::new(0),
            voices: AtomicU32::new(0),
            cycle: AtomicBool::new(false),
            params: (0..param_count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn publish_meters(&self, peak: f32, voices: usize, cycle: bool) {
        self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
        self.voices.store(voices as u32, Ordering::Relaxed);
        if cycle {
            self.cycle.store(true, Ordering::Relaxed);
        }
    }

    fn publish_params(&self, values: &[f32]) {
        for (slot, value) in self.params.iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::Relaxed))
    }

    pub fn active_voices(&self) -> usize {
        self.voices.load(Ordering::Relaxed) as usize
    }

    /// A patch routed a modulation cycle the engine had to freeze.
    /// Latches until playback restarts.
    pub fn cycle_seen(&self) -> bool {
        self.cycle.load(Ordering::Relaxed)
    }

    /// The engine-side value of a parameter, as of the last publish.
    pub fn param(&self, id: ar_patch::ParamId) -> f32 {
        self.params
            .get(id.index())
            .map_or(0.0, |slot| f32::from_bits(slot.load(Ordering::Relaxed)))
    }
}

/// A timed note for offline rendering. Times are in seconds.
#[derive(Clone, Copy, Debug)]
pub struct NoteEvent {
    pub at: f32,
    pub note: u8,
    pub velocity: f32,
    pub duration: f32,
}

struct PlaybackHandle {
    commands: HeapProd<EngineCommand>,
    reclaim: HeapCons<Box<Patch>>,
    snapshot: Arc<Snapshot>,
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Headless synth controller: bank, edit buffer, and live playback.
pub struct Controller {
    schema: Schema,
    bank: PatchBank,
    bank_dir: Option<PathBuf>,
    /// Working copy of the selected slot. Edits land here and go to
    /// the engine; the bank slot only changes on an explicit save.
    edit: Patch,
    current_slot: usize,
    playback: Option<PlaybackHandle>,
}

impl Controller {
    pub fn new() -> Self {
        let schema = Schema::synth();
        let bank = PatchBank::init(&schema);
        let edit = bank.patch(0).clone();
        Self {
            schema,
            bank,
            bank_dir: None,
            edit,
            current_slot: 0,
            playback: None,
        }
    }

    // --- Bank management ---

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn bank(&self) -> &PatchBank {
        &self.bank
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn edit_patch(&self) -> &Patch {
        &self.edit
    }

    /// Load a bank directory, creating it with init patches first if
    /// needed. Returns non-fatal warnings for damaged slots.
    pub fn load_bank(&mut self, dir: &Path) -> Result<Vec<BankWarning>, BankError> {
        ar_formats::ensure_bank(&self.schema, dir)?;
        let (bank, warnings) = ar_formats::load_bank(&self.schema, dir)?;
        self.bank = bank;
        self.bank_dir = Some(dir.to_path_buf());
        self.select_patch(self.current_slot);
        Ok(warnings)
    }

    /// Make a slot current and push it to the engine.
    pub fn select_patch(&mut self, slot: usize) {
        self.current_slot = slot.min(BANK_SLOTS - 1);
        self.edit = self.bank.patch(self.current_slot).clone();
        self.push_edit();
    }

    /// Store the edit buffer into its bank slot and write it to disk.
    pub fn save_patch(&mut self) -> Result<(), BankError> {
        self.bank.save(self.current_slot, self.edit.clone());
        if let Some(dir) = &self.bank_dir {
            ar_formats::save_slot(&self.schema, &self.bank, dir, self.current_slot)?;
        }
        Ok(())
    }

    pub fn rename_patch(&mut self, name: &str) {
        self.edit.set_name(name);
    }

    /// Edit one parameter by path, mirrored to the engine if playing.
    pub fn set_param(&mut self, path: &str, value: f32) -> bool {
        let Some(id) = self.schema.lookup(path) else {
            return false;
        };
        self.edit.set(&self.schema, id, value);
        self.send(EngineCommand::SetParam { id, value });
        true
    }

    pub fn get_param(&self, path: &str) -> Option<f32> {
        Some(self.edit.get(self.schema.lookup(path)?))
    }

    // --- Performance ---

    pub fn note_on(&mut self, note: u8, velocity: f32) {
        self.send(EngineCommand::NoteOn { note, velocity });
    }

    pub fn note_off(&mut self, note: u8) {
        self.send(EngineCommand::NoteOff { note });
    }

    pub fn pitch_bend(&mut self, value: f32) {
        self.send(EngineCommand::PitchBend(value));
    }

    pub fn mod_wheel(&mut self, value: f32) {
        self.send(EngineCommand::ModWheel(value));
    }

    pub fn aftertouch(&mut self, value: f32) {
        self.send(EngineCommand::Aftertouch(value));
    }

    pub fn set_tempo(&mut self, bpm: f32) {
        self.send(EngineCommand::SetTempo(bpm));
    }

    pub fn all_notes_off(&mut self) {
        self.send(EngineCommand::AllNotesOff);
    }

    // --- Real-time playback ---

    pub fn play(&mut self) {
        self.stop();

        let commands = HeapRb::<EngineCommand>::new(COMMAND_CAPACITY);
        let (command_tx, command_rx) = commands.split();
        let reclaim = HeapRb::<Box<Patch>>::new(RECLAIM_CAPACITY);
        let (reclaim_tx, reclaim_rx) = reclaim.split();
        let snapshot = Arc::new(Snapshot::new(self.schema.len()));
        let stop_signal = Arc::new(AtomicBool::new(false));

        let stop = stop_signal.clone();
        let snap = snapshot.clone();
        let thread = std::thread::spawn(move || {
            audio_thread(command_rx, reclaim_tx, snap, stop);
        });

        self.playback = Some(PlaybackHandle {
            commands: command_tx,
            reclaim: reclaim_rx,
            snapshot,
            stop_signal,
            thread: Some(thread),
        });
        // The fresh engine starts on an init patch.
        self.push_edit();
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
            // Anything still in the reclaim ring drops here.
            while pb.reclaim.try_pop().is_some() {}
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.playback.as_ref().map(|p| p.snapshot.as_ref())
    }

    fn send(&mut self, command: EngineCommand) {
        if let Some(pb) = &mut self.playback {
            let _ = pb.commands.try_push(command);
            // Free any patch boxes the engine has handed back.
            while pb.reclaim.try_pop().is_some() {}
        }
    }

    fn push_edit(&mut self) {
        let patch = Box::new(self.edit.clone());
        self.send(EngineCommand::SwapPatch(patch));
    }

    // --- Offline rendering ---

    /// Render the edit buffer offline with a list of timed notes.
    pub fn render_events(
        &self,
        sample_rate: u32,
        events: &[NoteEvent],
        total_seconds: f32,
    ) -> Vec<Frame> {
        let mut engine = Engine::new(sample_rate as f32);
        let _ = engine.handle_command(EngineCommand::SwapPatch(Box::new(self.edit.clone())));

        // Flatten to sample-stamped commands, offs after ons at a tie.
        let mut timed: Vec<(u64, EngineCommand)> = Vec::new();
        for e in events {
            let start = (e.at * sample_rate as f32) as u64;
            let end = start + (e.duration * sample_rate as f32) as u64;
            timed.push((start, EngineCommand::NoteOn { note: e.note, velocity: e.velocity }));
            timed.push((end, EngineCommand::NoteOff { note: e.note }));
        }
        timed.sort_by_key(|&(at, _)| at);

        let total = (total_seconds * sample_rate as f32) as usize;
        let mut frames = vec![Frame::silence(); total];
        let mut rendered = 0usize;
        while rendered < total {
            let len = BLOCK_FRAMES.min(total - rendered);
            let due = timed
                .iter()
                .take_while(|&&(at, _)| at < (rendered + len) as u64)
                .count();
            for (_, command) in timed.drain(..due) {
                let _ = engine.handle_command(command);
            }
            engine.render(&mut frames[rendered..rendered + len]);
            rendered += len;
        }
        frames
    }

    /// Render the edit buffer to a WAV byte vector.
    pub fn render_to_wav(
        &self,
        sample_rate: u32,
        events: &[NoteEvent],
        total_seconds: f32,
    ) -> Vec<u8> {
        let frames = self.render_events(sample_rate, events, total_seconds);
        frames_to_wav(&frames, sample_rate)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

fn audio_thread(
    mut commands: HeapCons<EngineCommand>,
    mut reclaim: HeapProd<Box<Patch>>,
    snapshot: Arc<Snapshot>,
    stop_signal: Arc<AtomicBool>,
) {
    let Ok(mut output) = CpalOutput::open() else {
        return;
    };
    let mut engine = Engine::new(output.sample_rate() as f32);
    if output.start().is_err() {
        return;
    }

    // Parameter mirror refresh interval, in blocks.
    const PARAM_PUBLISH_BLOCKS: u32 = 8;

    let mut block = [Frame::silence(); BLOCK_FRAMES];
    let mut blocks_rendered: u32 = 0;
    while !stop_signal.load(Ordering::Relaxed) {
        while let Some(command) = commands.try_pop() {
            if let Some(old) = engine.handle_command(command) {
                hand_back(&mut reclaim, old, &stop_signal);
            }
        }
        engine.render(&mut block);
        snapshot.publish_meters(engine.peak(), engine.active_voices(), engine.cycle_seen());
        if blocks_rendered % PARAM_PUBLISH_BLOCKS == 0 {
            snapshot.publish_params(engine.patch().values());
        }
        blocks_rendered = blocks_rendered.wrapping_add(1);
        for frame in &block {
            output.write_spin(*frame);
        }
    }
    let _ = output.stop();
}

/// Hand a replaced patch box back to the control thread. The ring is
/// sized so the push succeeds in normal operation; should it ever be
/// full anyway, spin until space opens but bail out once shutdown is
/// signalled so `stop` cannot hang on the join.
fn hand_back(reclaim: &mut HeapProd<Box<Patch>>, old: Box<Patch>, stop_signal: &AtomicBool) {
    let mut old = old;
    loop {
        match reclaim.try_push(old) {
            Ok(()) => return,
            Err(back) => {
                if stop_signal.load(Ordering::Relaxed) {
                    // Shutting down; freeing the box here is harmless.
                    drop(back);
                    return;
                }
                old = back;
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_render_produces_audio() {
        let ctrl = Controller::new();
        let events = [NoteEvent { at: 0.0, note: 60, velocity: 1.0, duration: 0.5 }];
        let frames = ctrl.render_events(44100, &events, 1.0);
        assert_eq!(frames.len(), 44100);
        let peak = frames.iter().map(|f| f.peak()).fold(0.0f32, f32::max);
        assert!(peak > 0.01);
        // The tail after release has died away.
        let tail = frames[44000..].iter().map(|f| f.peak()).fold(0.0f32, f32::max);
        assert!(tail < 0.05);
    }

    #[test]
    fn set_param_edits_the_working_copy() {
        let mut ctrl = Controller::new();
        assert!(ctrl.set_param("Ladder Filter/Cutoff", 800.0));
        assert_eq!(ctrl.get_param("Ladder Filter/Cutoff"), Some(800.0));
        assert!(!ctrl.set_param("No/Such Param", 1.0));
    }

    #[test]
    fn select_patch_resets_the_edit_buffer() {
        let mut ctrl = Controller::new();
        ctrl.set_param("Ladder Filter/Res", 0.9);
        ctrl.select_patch(1);
        assert_eq!(ctrl.get_param("Ladder Filter/Res"), Some(0.0));
    }

    #[test]
    fn save_patch_updates_the_bank() {
        let mut ctrl = Controller::new();
        ctrl.rename_patch("Saved Lead");
        ctrl.save_patch().unwrap();
        assert_eq!(ctrl.bank().name(0), "Saved Lead");
    }

    #[test]
    fn reclaim_ring_absorbs_a_full_command_burst() {
        let schema = Schema::synth();
        let (mut tx, mut rx) = HeapRb::<Box<Patch>>::new(RECLAIM_CAPACITY).split();
        // Every queued command can yield at most one replaced box, so
        // the ring must take a command ring's worth without refusing.
        for _ in 0..COMMAND_CAPACITY {
            assert!(tx.try_push(Box::new(Patch::init(&schema))).is_ok());
        }
        while rx.try_pop().is_some() {}
    }

    #[test]
    fn hand_back_returns_once_stop_is_signalled() {
        let schema = Schema::synth();
        let (mut tx, _rx) = HeapRb::<Box<Patch>>::new(1).split();
        tx.try_push(Box::new(Patch::init(&schema))).unwrap();
        let stop = AtomicBool::new(true);
        // Ring is full and nothing drains it; without the stop check
        // this would never return.
        hand_back(&mut tx, Box::new(Patch::init(&schema)), &stop);
    }

    #[test]
    fn snapshot_mirrors_published_values() {
        let schema = Schema::synth();
        let snap = Snapshot::new(schema.len());
        let patch = Patch::init(&schema);
        snap.publish_params(patch.values());
        let cutoff = schema.lookup("Ladder Filter/Cutoff").unwrap();
        assert_eq!(snap.param(cutoff), patch.get(cutoff));
    }

    #[test]
    fn render_to_wav_wraps_the_frames() {
        let ctrl = Controller::new();
        let events = [NoteEvent { at: 0.0, note: 69, velocity: 0.8, duration: 0.2 }];
        let wav = ctrl.render_to_wav(22050, &events, 0.5);
        assert_eq!(&wav[0..4], b"RIFF");
        // 0.5 s of stereo 16-bit at 22.05 kHz plus the 44-byte header.
        assert_eq!(wav.len(), 44 + 11025 * 4);
    }
}
