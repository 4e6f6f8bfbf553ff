//! Persistence for the Argon synth.
//!
//! Patches are JSON files keyed by `"Group/Name"` parameter paths; a
//! bank is a directory of 128 of them plus a name index. Audio renders
//! export as 16-bit stereo WAV.

mod bank_dir;
mod patch_file;
mod wav;

pub use bank_dir::{ensure_bank, load_bank, save_bank, save_slot, BankWarning};
pub use patch_file::{load_patch, patch_from_json, patch_to_json, save_patch};
pub use wav::{frames_to_wav, write_wav};

use std::fmt;

/// Error type for persistence operations.
#[derive(Debug)]
pub enum BankError {
    /// Underlying filesystem failure.
    Io(std::io::Error),
    /// A patch file could not be serialized.
    Json(serde_json::Error),
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for BankError {}

impl From<std::io::Error> for BankError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for BankError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
