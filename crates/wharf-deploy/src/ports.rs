//! Collaborators the deployment pipeline talks to.
//!
//! Implementations return `anyhow::Error`; the pipeline wraps failures with
//! the operation that was in flight.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::{AppRegionalResources, Application, Caller, DeployedTopic, Environment, WorkloadRecord};
use crate::stack::StackConfiguration;

/// Registry of applications, environments and workloads.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_application(&self, app: &str) -> anyhow::Result<Application>;

    async fn get_environment(&self, app: &str, env: &str) -> anyhow::Result<Environment>;

    async fn get_service(&self, app: &str, name: &str) -> anyhow::Result<WorkloadRecord>;
}

/// Source of raw manifest documents.
#[async_trait]
pub trait ManifestReader: Send + Sync {
    async fn read_manifest(&self, workload: &str) -> anyhow::Result<String>;

    /// Directory that relative build paths in manifests are resolved against.
    fn workspace_root(&self) -> PathBuf;
}

/// Arguments for a docker build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArguments {
    /// Repository the image is pushed to.
    pub uri: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub args: BTreeMap<String, String>,
    pub target: Option<String>,
    pub cache_from: Vec<String>,
    pub platform: Option<String>,
    pub tags: Vec<String>,
}

/// Builds a container image and pushes it to its repository.
#[async_trait]
pub trait ImageBuilderPusher: Send + Sync {
    /// Returns the pushed image digest.
    async fn build_and_push(&self, args: &BuildArguments) -> anyhow::Result<String>;
}

/// A named file inside an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinary {
    pub name: String,
    pub content: Vec<u8>,
}

/// Object storage for deployment artifacts.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Store `body` under `key` and return its URL.
    async fn put_artifact(&self, bucket: &str, key: &str, body: String) -> anyhow::Result<String>;

    /// Zip `files` into one archive stored under `key` and return its URL.
    async fn zip_and_upload(&self, bucket: &str, key: &str, files: &[NamedBinary]) -> anyhow::Result<String>;
}

/// Renders the addons template of a workload.
#[async_trait]
pub trait AddonsTemplater: Send + Sync {
    /// `None` when the workload has no addons.
    async fn template(&self, workload: &str) -> anyhow::Result<Option<String>>;
}

#[async_trait]
pub trait AppResourcesGetter: Send + Sync {
    async fn get_app_resources_by_region(
        &self,
        app: &Application,
        region: &str,
    ) -> anyhow::Result<AppRegionalResources>;
}

#[async_trait]
pub trait EndpointGetter: Send + Sync {
    /// Namespace under which services of the environment discover each other.
    async fn service_discovery_endpoint(&self, app: &str, env: &str) -> anyhow::Result<String>;
}

/// Brings an environment stack up to the version the workload expects.
#[async_trait]
pub trait EnvironmentUpgrader: Send + Sync {
    async fn upgrade(&self, app: &str, env: &str) -> anyhow::Result<()>;
}

/// Failure to apply a stack.
#[derive(Debug, thiserror::Error)]
pub enum StackDeployError {
    /// The change set computed for the stack contains no changes.
    #[error("change set for stack {stack} is empty")]
    EmptyChangeSet { stack: String },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Applies stack configurations.
#[async_trait]
pub trait StackDeployer: Send + Sync {
    async fn deploy_stack(
        &self,
        stack: &StackConfiguration,
        role_arn: Option<&str>,
    ) -> Result<(), StackDeployError>;
}

/// Restarts a running workload without changing its stack.
#[async_trait]
pub trait ServiceUpdater: Send + Sync {
    async fn force_update_service(&self, app: &str, env: &str, workload: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TopicLister: Send + Sync {
    async fn list_topics(&self, app: &str, env: &str) -> anyhow::Result<Vec<DeployedTopic>>;
}

/// Reports the template version of an application.
#[async_trait]
pub trait VersionGetter: Send + Sync {
    async fn version(&self, app: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn get(&self) -> anyhow::Result<Caller>;
}
