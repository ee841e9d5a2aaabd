//! Environment override merging over raw YAML documents.

use serde_yaml::{Mapping, Value};

/// Key holding per-environment overrides in every workload document.
pub(crate) const ENVIRONMENTS_KEY: &str = "environments";

/// Key discriminating the workload variant.
pub(crate) const TYPE_KEY: &str = "type";

/// Deep-merge `overlay` into `base`.
///
/// Mappings merge key by key, scalars and sequences from `overlay` replace
/// those in `base`, and null values in `overlay` are ignored.
pub(crate) fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(overlay)) => merge_mapping(base, overlay),
        (base, overlay) => *base = overlay.clone(),
    }
}

fn merge_mapping(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        match base.get_mut(key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
