//! Task definition override rules.

use serde::{Deserialize, Serialize};

/// Task definition fields that may never be overridden, as anchored patterns.
pub const BLOCKED_OVERRIDE_PATHS: &[&str] = &["Family", r"ContainerDefinitions\[\d+\].Name"];

/// Escape hatch writing `value` at `path` in the rendered task definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub path: String,

    #[serde(default)]
    pub value: serde_yaml::Value,
}

impl OverrideRule {
    pub fn new(path: impl Into<String>, value: serde_yaml::Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}
