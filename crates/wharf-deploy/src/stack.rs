//! Stack configurations produced by the resolver.

use std::collections::BTreeMap;

use serde::Serialize;
use wharf_manifest::{WorkloadKind, WorkloadManifest};

use crate::app::Tags;

/// Runtime values injected into a workload stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons_template_url: Option<String>,
    pub additional_tags: Tags,
    pub service_discovery_endpoint: String,
    pub account_id: String,
    pub region: String,

    /// Set when the image was built and pushed during this deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<RepositoryImage>,
}

/// A pushed image in the workload's repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryImage {
    pub repo_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    pub digest: String,
}

impl RepositoryImage {
    /// Image reference pinned to the pushed digest.
    pub fn reference(&self) -> String {
        format!("{}@{}", self.repo_url, self.digest)
    }
}

/// Application metadata linked into request-driven services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppInformation {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    pub account_principal_arn: String,
}

/// A worker subscription with its topic resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSubscription {
    /// Publishing workload.
    pub service: String,
    pub topic: String,
    pub topic_arn: String,
    pub dedicated_queue: bool,
}

/// Variant-specific parts of a stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StackKind {
    LoadBalancedWebService {
        /// Fronted by an HTTPS listener in the application's hosted zones.
        https: bool,
        aliases: Vec<String>,
    },
    BackendService,
    RequestDrivenWebService {
        app_info: AppInformation,
        #[serde(skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        /// Custom resource bundle URLs keyed by resource name.
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        custom_resource_urls: BTreeMap<String, String>,
    },
    WorkerService {
        subscriptions: Vec<ResolvedSubscription>,
    },
    ScheduledJob {
        #[serde(skip_serializing_if = "Option::is_none")]
        schedule: Option<String>,
    },
}

/// Everything needed to render and apply a workload stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackConfiguration {
    pub stack_name: String,
    pub app: String,
    pub env: String,
    pub workload: String,
    #[serde(flatten)]
    pub kind: StackKind,
    pub runtime: RuntimeConfig,
    pub manifest: WorkloadManifest,
}

impl StackConfiguration {
    pub fn new(app: &str, env: &str, manifest: WorkloadManifest, kind: StackKind, runtime: RuntimeConfig) -> Self {
        let workload = manifest.name().unwrap_or_default().to_string();
        Self {
            stack_name: stack_name(app, env, &workload),
            app: app.to_string(),
            env: env.to_string(),
            workload,
            kind,
            runtime,
            manifest,
        }
    }

    pub fn workload_kind(&self) -> WorkloadKind {
        self.manifest.kind()
    }

    /// Render the stack as a JSON document.
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Stack name for a workload in an environment.
pub fn stack_name(app: &str, env: &str, workload: &str) -> String {
    format!("{app}-{env}-{workload}")
}
