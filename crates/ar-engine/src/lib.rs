//! Synthesis engine for the Argon synth.
//!
//! Renders blocks of stereo audio from the active patch: two
//! oscillators through a resonant filter per voice, four envelopes,
//! three LFOs, a modulation matrix, and an arpeggiator. The render
//! path is allocation-free; control changes arrive as commands at
//! block boundaries.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod arp;
mod engine;
mod envelope;
mod filter;
mod frame;
mod lfo;
mod matrix;
mod osc;
mod params;
mod pool;
mod voice;

pub use arp::{ArpEvent, ArpEvents, ArpMode, Arpeggiator};
pub use engine::Engine;
pub use envelope::{EnvParams, EnvelopeState};
pub use filter::{FilterCoeffs, FilterSettings, FilterState, FilterType};
pub use frame::Frame;
pub use lfo::{sync_increment, LfoSettings, LfoShape, LfoState, SYNC_BEATS};
pub use matrix::{ModDeltas, ModInputs};
pub use osc::{note_increment, OscSettings, OscState, Waveform, MAX_UNISON};
pub use params::{ArpSettings, BlockSettings, ParamTable};
pub use pool::{VoicePool, MAX_VOICES};
pub use voice::{Controls, Voice, CONTROL_INTERVAL};
