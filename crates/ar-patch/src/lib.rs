//! Core data model for the Argon synthesizer.
//!
//! This crate defines the parameter schema, the patch (a complete set of
//! parameter values), the 128-slot bank, and the modulation routing
//! types. The engine consumes these; the persistence layer produces
//! them. String parameter keys exist only at the persistence boundary;
//! everything past patch load works in dense `ParamId` indices.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bank;
mod command;
mod patch;
mod routing;
mod schema;

pub use bank::{PatchBank, BANK_SLOTS};
pub use command::EngineCommand;
pub use patch::{Patch, PATCH_NAME_MAX};
pub use routing::{ModSlot, ModSource, ModTarget, OscDest, GENERIC_SLOTS, SOURCE_SLOTS};
pub use schema::{ParamId, ParamSpec, Schema};
