//! Deployment error types.

use thiserror::Error;
use wharf_manifest::{ManifestError, ValidationError};

use crate::alias::AliasError;

/// Result type for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors raised while resolving or deploying a workload.
///
/// Collaborator failures are kept as the source; the message names the
/// operation that failed.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("read service {workload} manifest file")]
    ReadManifest {
        workload: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unmarshal service {workload} manifest")]
    Unmarshal {
        workload: String,
        #[source]
        source: ManifestError,
    },

    #[error("apply environment {env} override")]
    ApplyOverride {
        env: String,
        #[source]
        source: ManifestError,
    },

    /// Manifest failed validation; the source carries the full field path.
    #[error("validate manifest against environment {env}")]
    Validation {
        env: String,
        #[source]
        source: ValidationError,
    },

    #[error("manifest for {workload} declares type {declared}, but the service is registered as {registered}")]
    KindMismatch {
        workload: String,
        declared: String,
        registered: String,
    },

    #[error("get application {app}")]
    Application {
        app: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("get environment {env} in application {app}")]
    Environment {
        app: String,
        env: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("get service configuration")]
    Service {
        #[source]
        source: anyhow::Error,
    },

    #[error("execute \"env upgrade --app {app} --name {env}\"")]
    EnvironmentUpgrade {
        app: String,
        env: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("build and push image")]
    Build {
        #[source]
        source: anyhow::Error,
    },

    #[error("retrieve addons template")]
    AddonsTemplate {
        #[source]
        source: anyhow::Error,
    },

    #[error("put addons artifact to bucket {bucket}")]
    Upload {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("upload custom resources to bucket {bucket}")]
    CustomResources {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("get application {app} resources from region {region}")]
    AppResources {
        app: String,
        region: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("image repository for {workload} does not exist in region {region} of account {account_id}")]
    RepositoryNotFound {
        workload: String,
        region: String,
        account_id: String,
    },

    #[error("get service discovery endpoint for environment {env}")]
    Endpoint {
        env: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("get identity")]
    Identity {
        #[source]
        source: anyhow::Error,
    },

    #[error("get version for app {app}")]
    AppVersion {
        app: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error("get SNS topics for app {app} and environment {env}")]
    ListTopics {
        app: String,
        env: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("SNS topic {arn} does not exist in environment {env}")]
    TopicNotFound { arn: String, env: String },

    #[error("deploy service {workload}")]
    StackDeployment {
        workload: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("force an update for service {workload}")]
    ForceUpdate {
        workload: String,
        env: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// Follow-up command for the operator, when one helps.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ForceUpdate { workload, env, .. } => Some(format!(
                "Run `wharf svc status --name {workload} --env {env}` to check for the fail reason."
            )),
            Self::EnvironmentUpgrade { app, env, .. } => {
                Some(format!("Run `wharf env upgrade --app {app} --name {env}` and retry."))
            }
            Self::Alias(AliasError::IncompatibleVersion { .. }) => {
                Some("Run `wharf app upgrade` first.".to_string())
            }
            _ => None,
        }
    }

    /// The validation failure behind this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}
