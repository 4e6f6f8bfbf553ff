//! Commands crossing from the control thread into the engine.

use alloc::boxed::Box;

use crate::patch::Patch;
use crate::schema::ParamId;

/// One message on the control-to-audio command ring. Drained by the
/// engine at block boundaries; everything here is plain data so the
/// audio thread never touches a lock or the allocator while applying
/// them. `SwapPatch` carries an owning box whose previous occupant is
/// handed back on the reclaim ring for the sender to drop.
#[derive(Debug)]
pub enum EngineCommand {
    NoteOn { note: u8, velocity: f32 },
    NoteOff { note: u8 },
    /// Normalized bend in [-1, 1]; range in semitones comes from the patch.
    PitchBend(f32),
    /// Mod wheel position in [0, 1].
    ModWheel(f32),
    /// Channel aftertouch in [0, 1].
    Aftertouch(f32),
    /// Live edit of one parameter on the active patch.
    SetParam { id: ParamId, value: f32 },
    /// Host tempo in BPM, for synced LFO and arp rates.
    SetTempo(f32),
    /// Replace the active patch wholesale.
    SwapPatch(Box<Patch>),
    AllNotesOff,
}
