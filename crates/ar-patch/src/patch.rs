//! A patch: one complete set of parameter values.

use arrayvec::ArrayString;

use alloc::vec::Vec;

use crate::schema::{ParamId, Schema};

/// Maximum patch display-name length (bytes).
pub const PATCH_NAME_MAX: usize = 32;

/// A complete named parameter set. Every schema parameter is present;
/// the value vector is indexed by `ParamId` and always schema-length.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    name: ArrayString<PATCH_NAME_MAX>,
    values: Vec<f32>,
}

impl Patch {
    /// The schema-default "init" patch.
    pub fn init(schema: &Schema) -> Self {
        let mut patch = Self {
            name: ArrayString::new(),
            values: schema.iter().map(|(_, s)| s.default).collect(),
        };
        patch.set_name("INIT PATCH");
        patch
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the display name, truncating at the storage limit.
    pub fn set_name(&mut self, name: &str) {
        self.name.clear();
        for ch in name.chars() {
            if self.name.try_push(ch).is_err() {
                break;
            }
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()]
    }

    /// Set a value, clamped to the parameter's declared range.
    pub fn set(&mut self, schema: &Schema, id: ParamId, value: f32) {
        self.values[id.index()] = schema.clamp(id, value);
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_matches_schema_defaults() {
        let schema = Schema::synth();
        let patch = Patch::init(&schema);
        assert_eq!(patch.name(), "INIT PATCH");
        for (id, spec) in schema.iter() {
            assert_eq!(patch.get(id), spec.default);
        }
    }

    #[test]
    fn set_clamps_out_of_range() {
        let schema = Schema::synth();
        let mut patch = Patch::init(&schema);
        let sustain = schema.id("Amp Env", "Sustain").unwrap();
        patch.set(&schema, sustain, 3.5);
        assert_eq!(patch.get(sustain), 1.0);
        patch.set(&schema, sustain, -1.0);
        assert_eq!(patch.get(sustain), 0.0);
    }

    #[test]
    fn long_names_truncate() {
        let schema = Schema::synth();
        let mut patch = Patch::init(&schema);
        patch.set_name("a very long patch name that exceeds the storage limit");
        assert!(patch.name().len() <= PATCH_NAME_MAX);
        assert!(patch.name().starts_with("a very long"));
    }
}
