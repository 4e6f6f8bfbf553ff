//! The 128-slot patch bank.

use arrayvec::ArrayString;

use alloc::vec::Vec;

use crate::patch::{Patch, PATCH_NAME_MAX};
use crate::schema::Schema;

/// Number of slots in a bank. Fixed; every slot always holds a complete
/// patch.
pub const BANK_SLOTS: usize = 128;

/// An in-memory bank: 128 patches plus the display-name index.
///
/// Invariant: `names.len() == BANK_SLOTS == patches.len()`, and
/// `names[i]` equals `patches[i].name()` after every completed save or
/// rename.
pub struct PatchBank {
    patches: Vec<Patch>,
    names: Vec<ArrayString<PATCH_NAME_MAX>>,
}

impl PatchBank {
    /// A bank of init patches.
    pub fn init(schema: &Schema) -> Self {
        let init = Patch::init(schema);
        let mut names = Vec::with_capacity(BANK_SLOTS);
        for _ in 0..BANK_SLOTS {
            let mut n = ArrayString::new();
            n.push_str(init.name());
            names.push(n);
        }
        Self {
            patches: alloc::vec![init; BANK_SLOTS],
            names,
        }
    }

    /// Borrow the patch in a slot. Out-of-range slots resolve to slot 0
    /// rather than failing; bank access never errors outward.
    pub fn patch(&self, slot: usize) -> &Patch {
        &self.patches[if slot < BANK_SLOTS { slot } else { 0 }]
    }

    /// Store a patch in a slot, updating the name index with it.
    pub fn save(&mut self, slot: usize, patch: Patch) {
        if slot >= BANK_SLOTS {
            return;
        }
        self.names[slot].clear();
        self.names[slot].push_str(patch.name());
        self.patches[slot] = patch;
    }

    /// Rename a slot (both the index entry and the stored patch).
    pub fn rename(&mut self, slot: usize, name: &str) {
        if slot >= BANK_SLOTS {
            return;
        }
        self.patches[slot].set_name(name);
        self.names[slot].clear();
        self.names[slot].push_str(self.patches[slot].name());
    }

    /// Display names in slot order. Always `BANK_SLOTS` entries.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    pub fn name(&self, slot: usize) -> &str {
        &self.names[if slot < BANK_SLOTS { slot } else { 0 }]
    }
}
