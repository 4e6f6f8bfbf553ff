//! Bank directory layout.
//!
//! A bank is a directory holding `patch_1.argon` through
//! `patch_128.argon` plus an `index.txt` of display names, one per
//! line. A damaged or missing slot file loads as an init patch and is
//! reported as a warning; only filesystem failures abort a load.

use std::fs;
use std::path::{Path, PathBuf};

use ar_patch::{Patch, PatchBank, Schema, BANK_SLOTS};

use crate::patch_file::{load_patch, save_patch};
use crate::BankError;

/// A non-fatal problem found while loading a bank.
#[derive(Debug, Clone, PartialEq)]
pub struct BankWarning {
    /// Zero-based slot index.
    pub slot: usize,
    pub reason: String,
}

fn slot_path(dir: &Path, slot: usize) -> PathBuf {
    dir.join(format!("patch_{}.argon", slot + 1))
}

/// Create the directory and fill any missing slot files with init
/// patches, leaving existing files alone.
pub fn ensure_bank(schema: &Schema, dir: &Path) -> Result<(), BankError> {
    fs::create_dir_all(dir)?;
    let init = Patch::init(schema);
    for slot in 0..BANK_SLOTS {
        let path = slot_path(dir, slot);
        if !path.exists() {
            save_patch(schema, &init, &path)?;
        }
    }
    if !dir.join("index.txt").exists() {
        write_index(dir, (0..BANK_SLOTS).map(|_| init.name()))?;
    }
    Ok(())
}

/// Load a full bank. Slots that fail to parse come back as init
/// patches with a warning attached; the bank itself always loads.
pub fn load_bank(schema: &Schema, dir: &Path) -> Result<(PatchBank, Vec<BankWarning>), BankError> {
    let mut bank = PatchBank::init(schema);
    let mut warnings = Vec::new();
    for slot in 0..BANK_SLOTS {
        let path = slot_path(dir, slot);
        if !path.exists() {
            warnings.push(BankWarning { slot, reason: "missing file".to_string() });
            continue;
        }
        match load_patch(schema, &path) {
            Ok(patch) => bank.save(slot, patch),
            Err(e) => warnings.push(BankWarning { slot, reason: e.to_string() }),
        }
    }
    Ok((bank, warnings))
}

/// Write every slot and the name index.
pub fn save_bank(schema: &Schema, bank: &PatchBank, dir: &Path) -> Result<(), BankError> {
    fs::create_dir_all(dir)?;
    for slot in 0..BANK_SLOTS {
        save_patch(schema, bank.patch(slot), &slot_path(dir, slot))?;
    }
    write_index(dir, bank.names())
}

/// Write one slot and refresh the index.
pub fn save_slot(
    schema: &Schema,
    bank: &PatchBank,
    dir: &Path,
    slot: usize,
) -> Result<(), BankError> {
    fs::create_dir_all(dir)?;
    save_patch(schema, bank.patch(slot), &slot_path(dir, slot))?;
    write_index(dir, bank.names())
}

fn write_index<'a>(dir: &Path, names: impl Iterator<Item = &'a str>) -> Result<(), BankError> {
    let mut text = String::new();
    for name in names {
        text.push_str(name);
        text.push('\n');
    }
    fs::write(dir.join("index.txt"), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("argon-bank-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn ensure_creates_full_bank() {
        let schema = Schema::synth();
        let dir = scratch_dir("ensure");
        ensure_bank(&schema, &dir).unwrap();
        for slot in 0..BANK_SLOTS {
            assert!(slot_path(&dir, slot).exists());
        }
        let index = fs::read_to_string(dir.join("index.txt")).unwrap();
        assert_eq!(index.lines().count(), BANK_SLOTS);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_and_load_round_trip() {
        let schema = Schema::synth();
        let dir = scratch_dir("roundtrip");
        let mut bank = PatchBank::init(&schema);
        let mut patch = Patch::init(&schema);
        patch.set_name("Bright Keys");
        let res = schema.id("Ladder Filter", "Res").unwrap();
        patch.set(&schema, res, 0.4);
        bank.save(17, patch);

        save_bank(&schema, &bank, &dir).unwrap();
        let (loaded, warnings) = load_bank(&schema, &dir).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.name(17), "Bright Keys");
        assert_eq!(loaded.patch(17).get(res), 0.4);
        assert_eq!(loaded.name(16), "INIT PATCH");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_slot_loads_as_init_with_warning() {
        let schema = Schema::synth();
        let dir = scratch_dir("corrupt");
        ensure_bank(&schema, &dir).unwrap();
        fs::write(slot_path(&dir, 5), "{{ broken").unwrap();

        let (bank, warnings) = load_bank(&schema, &dir).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].slot, 5);
        assert_eq!(bank.name(5), "INIT PATCH");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_slot_warns_but_loads() {
        let schema = Schema::synth();
        let dir = scratch_dir("missing");
        ensure_bank(&schema, &dir).unwrap();
        fs::remove_file(slot_path(&dir, 9)).unwrap();

        let (bank, warnings) = load_bank(&schema, &dir).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].slot, 9);
        assert_eq!(bank.name(9), "INIT PATCH");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_leaves_existing_files_alone() {
        let schema = Schema::synth();
        let dir = scratch_dir("preserve");
        let mut bank = PatchBank::init(&schema);
        let mut patch = Patch::init(&schema);
        patch.set_name("Keep Me");
        bank.save(0, patch);
        save_bank(&schema, &bank, &dir).unwrap();

        ensure_bank(&schema, &dir).unwrap();
        let (loaded, _) = load_bank(&schema, &dir).unwrap();
        assert_eq!(loaded.name(0), "Keep Me");
        let _ = fs::remove_dir_all(&dir);
    }
}
