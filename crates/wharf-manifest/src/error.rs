//! Errors raised while reading or transforming a manifest.

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors from unmarshaling a manifest or applying overrides to it.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("unmarshal manifest: {0}")]
    Unmarshal(#[source] serde_yaml::Error),

    #[error("manifest is missing the \"type\" field")]
    MissingType,

    #[error("workload type {0:?} is not supported")]
    UnknownType(String),

    #[error("environment override for {env:?} must be a mapping")]
    InvalidOverride { env: String },

    #[error("apply environment {env} override: {source}")]
    ApplyOverride {
        env: String,
        #[source]
        source: serde_yaml::Error,
    },
}
