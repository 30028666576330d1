use json_patch::{diff, Patch};
use kube::core::DynamicObject;
use serde_json::json;

use crate::poolspec::PoolSpec;
use crate::DKLB_CONFIG_ANNOTATION;

/// Writes the fully-defaulted spec back onto the object's YAML config
/// annotation, so that every field the admission path defaulted is visible
/// on the stored resource rather than only in the in-memory reconcile pass.
pub fn apply_defaulted_spec(object: &DynamicObject, spec: &PoolSpec) -> DynamicObject {
    let mut mutated = object.clone();
    let yaml = serde_yaml::to_string(spec).unwrap_or_default();
    mutated
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(DKLB_CONFIG_ANNOTATION.to_string(), yaml);
    mutated
}

/// RFC-6902 patch between the original and mutated object, or `None` if
/// defaulting produced no change.
pub fn compute_patch(original: &DynamicObject, mutated: &DynamicObject) -> Option<Patch> {
    let before = json!(original);
    let after = json!(mutated);
    let patch = diff(&before, &after);
    if patch.is_empty() {
        None
    } else {
        Some(Patch(patch.to_vec()))
    }
}
