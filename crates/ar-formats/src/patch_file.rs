//! Single-patch JSON format.
//!
//! A patch file is a name plus a `"Group/Name"` to value map. Unknown
//! keys are ignored on load and missing ones take their schema
//! defaults, so files survive schema growth in both directions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ar_patch::{Patch, Schema};
use serde::{Deserialize, Serialize};

use crate::BankError;

#[derive(Serialize, Deserialize)]
struct PatchFile {
    name: String,
    parameters: BTreeMap<String, f32>,
}

/// Serialize a patch to its JSON text.
pub fn patch_to_json(schema: &Schema, patch: &Patch) -> Result<String, BankError> {
    let mut parameters = BTreeMap::new();
    for (id, _) in schema.iter() {
        parameters.insert(schema.path(id), patch.get(id));
    }
    let file = PatchFile { name: patch.name().to_string(), parameters };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse JSON text into a patch. Values run through the schema clamp,
/// so a hand-edited file cannot push a parameter out of range.
pub fn patch_from_json(schema: &Schema, text: &str) -> Result<Patch, BankError> {
    let file: PatchFile = serde_json::from_str(text)?;
    let mut patch = Patch::init(schema);
    patch.set_name(&file.name);
    for (path, value) in &file.parameters {
        if let Some(id) = schema.lookup(path) {
            patch.set(schema, id, *value);
        }
    }
    Ok(patch)
}

pub fn save_patch(schema: &Schema, patch: &Patch, path: &Path) -> Result<(), BankError> {
    fs::write(path, patch_to_json(schema, patch)?)?;
    Ok(())
}

pub fn load_patch(schema: &Schema, path: &Path) -> Result<Patch, BankError> {
    patch_from_json(schema, &fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_values() {
        let schema = Schema::synth();
        let mut patch = Patch::init(&schema);
        patch.set_name("Round Trip");
        let cutoff = schema.id("Ladder Filter", "Cutoff").unwrap();
        patch.set(&schema, cutoff, 1234.5);
        let text = patch_to_json(&schema, &patch).unwrap();
        let back = patch_from_json(&schema, &text).unwrap();
        assert_eq!(back.name(), "Round Trip");
        assert_eq!(back.get(cutoff), 1234.5);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let schema = Schema::synth();
        let text = r#"{"name":"Odd","parameters":{"Ghost/Param":42.0,"Ladder Filter/Res":0.3}}"#;
        let patch = patch_from_json(&schema, text).unwrap();
        let res = schema.id("Ladder Filter", "Res").unwrap();
        assert_eq!(patch.get(res), 0.3);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let schema = Schema::synth();
        let text = r#"{"name":"Sparse","parameters":{}}"#;
        let patch = patch_from_json(&schema, text).unwrap();
        let cutoff = schema.id("Ladder Filter", "Cutoff").unwrap();
        assert_eq!(patch.get(cutoff), 20000.0);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let schema = Schema::synth();
        let text = r#"{"name":"Hot","parameters":{"Ladder Filter/Res":99.0}}"#;
        let patch = patch_from_json(&schema, text).unwrap();
        let res = schema.id("Ladder Filter", "Res").unwrap();
        assert_eq!(patch.get(res), 1.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let schema = Schema::synth();
        assert!(matches!(
            patch_from_json(&schema, "not json"),
            Err(BankError::Json(_))
        ));
    }
}
