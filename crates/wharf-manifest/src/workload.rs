//! The closed set of workload shapes and their capability queries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::duration::ManifestDuration;
use crate::env::{merge, ENVIRONMENTS_KEY, TYPE_KEY};
use crate::error::{ManifestError, ManifestResult};
use crate::image::{DockerBuildArgs, Image, SidecarConfig};
use crate::network::{NetworkConfig, RoutingRule};
use crate::task::TaskConfig;
use crate::taskdef::OverrideRule;
use crate::topic::{PublishConfig, SubscribeConfig, Topic, TopicSubscription};

/// Per-environment partial documents merged over the base manifest.
pub type EnvironmentOverrides = BTreeMap<String, Value>;

/// Workload variant discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadKind {
    LoadBalancedWebService,
    BackendService,
    RequestDrivenWebService,
    WorkerService,
    ScheduledJob,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 5] = [
        Self::LoadBalancedWebService,
        Self::BackendService,
        Self::RequestDrivenWebService,
        Self::WorkerService,
        Self::ScheduledJob,
    ];

    /// The `type` value written in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadBalancedWebService => "Load Balanced Web Service",
            Self::BackendService => "Backend Service",
            Self::RequestDrivenWebService => "Request-Driven Web Service",
            Self::WorkerService => "Worker Service",
            Self::ScheduledJob => "Scheduled Job",
        }
    }

    /// Parse a manifest `type` value.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Jobs run to completion; everything else is a long-running service.
    pub fn is_job(&self) -> bool {
        matches!(self, Self::ScheduledJob)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable workload, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkloadManifest {
    #[serde(rename = "Load Balanced Web Service")]
    LoadBalancedWebService(LoadBalancedWebService),

    #[serde(rename = "Backend Service")]
    BackendService(BackendService),

    #[serde(rename = "Request-Driven Web Service")]
    RequestDrivenWebService(RequestDrivenWebService),

    #[serde(rename = "Worker Service")]
    WorkerService(WorkerService),

    #[serde(rename = "Scheduled Job")]
    ScheduledJob(ScheduledJob),
}

/// Internet-facing service behind a load balancer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancedWebService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Image,

    #[serde(default)]
    pub http: RoutingRule,

    #[serde(flatten)]
    pub task: TaskConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, SidecarConfig>,

    #[serde(default, skip_serializing_if = "NetworkConfig::is_empty")]
    pub network: NetworkConfig,

    #[serde(default, skip_serializing_if = "PublishConfig::is_empty")]
    pub publish: PublishConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taskdef_overrides: Vec<OverrideRule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: EnvironmentOverrides,
}

/// Service reachable only from inside the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Image,

    #[serde(flatten)]
    pub task: TaskConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, SidecarConfig>,

    #[serde(default, skip_serializing_if = "NetworkConfig::is_empty")]
    pub network: NetworkConfig,

    #[serde(default, skip_serializing_if = "PublishConfig::is_empty")]
    pub publish: PublishConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taskdef_overrides: Vec<OverrideRule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: EnvironmentOverrides,
}

/// Web service on a managed request-driven runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDrivenWebService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Image,

    #[serde(default)]
    pub http: RequestDrivenHttpConfig,

    #[serde(flatten)]
    pub instance: InstanceConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: EnvironmentOverrides,
}

/// HTTP settings for a request-driven service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDrivenHttpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<String>,

    /// Custom domain; only one is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Instance size for a request-driven service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
}

/// Service consuming events from subscribed topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Image,

    #[serde(flatten)]
    pub task: TaskConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, SidecarConfig>,

    #[serde(default, skip_serializing_if = "NetworkConfig::is_empty")]
    pub network: NetworkConfig,

    #[serde(default, skip_serializing_if = "SubscribeConfig::is_empty")]
    pub subscribe: SubscribeConfig,

    #[serde(default, skip_serializing_if = "PublishConfig::is_empty")]
    pub publish: PublishConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taskdef_overrides: Vec<OverrideRule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: EnvironmentOverrides,
}

/// Task triggered on a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Image,

    #[serde(default)]
    pub on: JobTriggerConfig,

    #[serde(flatten)]
    pub task: TaskConfig,

    /// Attempts after the first failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ManifestDuration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sidecars: BTreeMap<String, SidecarConfig>,

    #[serde(default, skip_serializing_if = "NetworkConfig::is_empty")]
    pub network: NetworkConfig,

    #[serde(default, skip_serializing_if = "PublishConfig::is_empty")]
    pub publish: PublishConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taskdef_overrides: Vec<OverrideRule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: EnvironmentOverrides,
}

/// When a scheduled job runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTriggerConfig {
    /// Cron expression, `@every <duration>` or a predefined schedule such as `@daily`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl WorkloadManifest {
    /// Unmarshal a manifest document.
    pub fn from_yaml(raw: &str) -> ManifestResult<Self> {
        let doc: Value = serde_yaml::from_str(raw).map_err(ManifestError::Unmarshal)?;
        Self::from_value(doc)
    }

    /// Unmarshal an already parsed manifest document.
    pub fn from_value(doc: Value) -> ManifestResult<Self> {
        let kind = match doc.get(TYPE_KEY) {
            None | Some(Value::Null) => return Err(ManifestError::MissingType),
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(ManifestError::UnknownType(format!("{:?}", other))),
        };
        if WorkloadKind::parse(&kind).is_none() {
            return Err(ManifestError::UnknownType(kind));
        }
        serde_yaml::from_value(doc).map_err(ManifestError::Unmarshal)
    }

    /// Serialize back into a YAML document.
    pub fn to_yaml(&self) -> ManifestResult<String> {
        serde_yaml::to_string(self).map_err(ManifestError::Unmarshal)
    }

    /// Produce the effective manifest for `env`.
    ///
    /// The environment's override document is deep-merged over the base and
    /// the `environments` table is dropped. Environments with no entry yield
    /// the base manifest. The workload type can never be overridden.
    pub fn apply_env(&self, env: &str) -> ManifestResult<Self> {
        let overlay = self.env_override(env)?.unwrap_or(Value::Null);
        let effective = self.with_override(env, &overlay)?;
        tracing::debug!(
            env,
            workload = self.name().unwrap_or_default(),
            "applied environment override"
        );
        Ok(effective)
    }

    /// The override document declared for `env`, without `type` or nested
    /// `environments` keys.
    pub fn env_override(&self, env: &str) -> ManifestResult<Option<Value>> {
        let mut doc = serde_yaml::to_value(self).map_err(|source| ManifestError::ApplyOverride {
            env: env.to_string(),
            source,
        })?;
        let overlay = doc
            .as_mapping_mut()
            .and_then(|map| map.remove(ENVIRONMENTS_KEY))
            .and_then(|mut envs| envs.as_mapping_mut().and_then(|m| m.remove(env)));

        let Some(mut overlay) = overlay else {
            return Ok(None);
        };
        if let Some(map) = overlay.as_mapping_mut() {
            map.remove(TYPE_KEY);
            map.remove(ENVIRONMENTS_KEY);
        } else if !overlay.is_null() {
            return Err(ManifestError::InvalidOverride {
                env: env.to_string(),
            });
        }
        Ok(Some(overlay))
    }

    /// Merge `overlay` over this manifest and drop the `environments` table.
    pub fn with_override(&self, env: &str, overlay: &Value) -> ManifestResult<Self> {
        let apply_err = |source| ManifestError::ApplyOverride {
            env: env.to_string(),
            source,
        };

        let mut doc = serde_yaml::to_value(self).map_err(apply_err)?;
        if let Some(map) = doc.as_mapping_mut() {
            map.remove(ENVIRONMENTS_KEY);
        }
        merge(&mut doc, overlay);
        serde_yaml::from_value(doc).map_err(apply_err)
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            Self::LoadBalancedWebService(_) => WorkloadKind::LoadBalancedWebService,
            Self::BackendService(_) => WorkloadKind::BackendService,
            Self::RequestDrivenWebService(_) => WorkloadKind::RequestDrivenWebService,
            Self::WorkerService(_) => WorkloadKind::WorkerService,
            Self::ScheduledJob(_) => WorkloadKind::ScheduledJob,
        }
    }

    /// Workload name, when set and non-empty.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Self::LoadBalancedWebService(w) => w.name.as_deref(),
            Self::BackendService(w) => w.name.as_deref(),
            Self::RequestDrivenWebService(w) => w.name.as_deref(),
            Self::WorkerService(w) => w.name.as_deref(),
            Self::ScheduledJob(w) => w.name.as_deref(),
        };
        name.filter(|n| !n.is_empty())
    }

    pub fn image(&self) -> &Image {
        match self {
            Self::LoadBalancedWebService(w) => &w.image,
            Self::BackendService(w) => &w.image,
            Self::RequestDrivenWebService(w) => &w.image,
            Self::WorkerService(w) => &w.image,
            Self::ScheduledJob(w) => &w.image,
        }
    }

    /// Main container port.
    pub fn port(&self) -> Option<u16> {
        self.image().port
    }

    /// Whether deploying requires a local image build.
    pub fn requires_build(&self) -> bool {
        self.image().requires_build()
    }

    /// Docker build arguments relative to `root`, for locally built images.
    pub fn build_args(&self, root: &Path) -> Option<DockerBuildArgs> {
        self.image().build_config(root)
    }

    /// Task settings, absent for request-driven services.
    pub fn task(&self) -> Option<&TaskConfig> {
        match self {
            Self::LoadBalancedWebService(w) => Some(&w.task),
            Self::BackendService(w) => Some(&w.task),
            Self::WorkerService(w) => Some(&w.task),
            Self::ScheduledJob(w) => Some(&w.task),
            Self::RequestDrivenWebService(_) => None,
        }
    }

    /// Task platform in `os/arch` form, if configured.
    pub fn task_platform(&self) -> Option<String> {
        self.task()?.platform.as_ref()?.as_platform_string()
    }

    pub fn sidecars(&self) -> Option<&BTreeMap<String, SidecarConfig>> {
        match self {
            Self::LoadBalancedWebService(w) => Some(&w.sidecars),
            Self::BackendService(w) => Some(&w.sidecars),
            Self::WorkerService(w) => Some(&w.sidecars),
            Self::ScheduledJob(w) => Some(&w.sidecars),
            Self::RequestDrivenWebService(_) => None,
        }
    }

    /// Topics this workload publishes.
    pub fn publish_topics(&self) -> &[Topic] {
        match self {
            Self::LoadBalancedWebService(w) => &w.publish.topics,
            Self::BackendService(w) => &w.publish.topics,
            Self::WorkerService(w) => &w.publish.topics,
            Self::ScheduledJob(w) => &w.publish.topics,
            Self::RequestDrivenWebService(_) => &[],
        }
    }

    /// Topics this workload subscribes to.
    pub fn subscriptions(&self) -> &[TopicSubscription] {
        match self {
            Self::WorkerService(w) => &w.subscribe.topics,
            _ => &[],
        }
    }

    /// DNS aliases requested for the workload.
    pub fn aliases(&self) -> Vec<String> {
        match self {
            Self::LoadBalancedWebService(w) => {
                w.http.alias.as_ref().map(|a| a.to_vec()).unwrap_or_default()
            }
            Self::RequestDrivenWebService(w) => {
                w.http.alias.iter().filter(|a| !a.is_empty()).cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Schedule for jobs.
    pub fn schedule(&self) -> Option<&str> {
        match self {
            Self::ScheduledJob(w) => w.on.schedule.as_deref(),
            _ => None,
        }
    }

    /// Routing rule for load balanced services.
    pub fn http(&self) -> Option<&RoutingRule> {
        match self {
            Self::LoadBalancedWebService(w) => Some(&w.http),
            _ => None,
        }
    }

    pub fn network(&self) -> Option<&NetworkConfig> {
        match self {
            Self::LoadBalancedWebService(w) => Some(&w.network),
            Self::BackendService(w) => Some(&w.network),
            Self::WorkerService(w) => Some(&w.network),
            Self::ScheduledJob(w) => Some(&w.network),
            Self::RequestDrivenWebService(_) => None,
        }
    }

    pub fn taskdef_overrides(&self) -> &[OverrideRule] {
        match self {
            Self::LoadBalancedWebService(w) => &w.taskdef_overrides,
            Self::BackendService(w) => &w.taskdef_overrides,
            Self::WorkerService(w) => &w.taskdef_overrides,
            Self::ScheduledJob(w) => &w.taskdef_overrides,
            Self::RequestDrivenWebService(_) => &[],
        }
    }

    /// Environment override documents keyed by environment name.
    pub fn environments(&self) -> &EnvironmentOverrides {
        match self {
            Self::LoadBalancedWebService(w) => &w.environments,
            Self::BackendService(w) => &w.environments,
            Self::RequestDrivenWebService(w) => &w.environments,
            Self::WorkerService(w) => &w.environments,
            Self::ScheduledJob(w) => &w.environments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Count, Range};

    const LB_MANIFEST: &str = r#"
name: frontend
type: Load Balanced Web Service
image:
  build: frontend/Dockerfile
  port: 80
http:
  path: /
  alias: web.test.shop.example.com
cpu: 256
memory: 512
count: 1
publish:
  topics:
    - name: orders
environments:
  test:
    count:
      range: 1-10
      cpu_percentage: 70
    http:
      alias: api.test.shop.example.com
  prod:
    type: Backend Service
    cpu: 1024
"#;

    #[test]
    fn test_from_yaml_dispatches_on_type() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        assert_eq!(manifest.kind(), WorkloadKind::LoadBalancedWebService);
        assert_eq!(manifest.name(), Some("frontend"));
        assert_eq!(manifest.port(), Some(80));
        assert!(manifest.requires_build());
        assert_eq!(manifest.publish_topics(), &[Topic::new("orders")]);
        assert_eq!(manifest.aliases(), vec!["web.test.shop.example.com"]);
        assert!(manifest.subscriptions().is_empty());
    }

    #[test]
    fn test_from_yaml_missing_type() {
        let err = WorkloadManifest::from_yaml("name: api\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingType));
    }

    #[test]
    fn test_from_yaml_unknown_type() {
        let err = WorkloadManifest::from_yaml("name: api\ntype: Lambda Function\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownType(ref t) if t == "Lambda Function"));
    }

    #[test]
    fn test_apply_env_merges_override() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        let test = manifest.apply_env("test").unwrap();

        assert!(test.environments().is_empty());
        assert_eq!(test.aliases(), vec!["api.test.shop.example.com"]);
        let task = test.task().unwrap();
        assert_eq!(task.cpu, Some(256));
        match task.count.as_ref().unwrap() {
            Count::Advanced(count) => {
                assert_eq!(count.range, Some(Range::Band("1-10".into())));
                assert!(count.cpu.is_some());
            }
            other => panic!("expected autoscaling count, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_env_cannot_change_type() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        let prod = manifest.apply_env("prod").unwrap();
        assert_eq!(prod.kind(), WorkloadKind::LoadBalancedWebService);
        assert_eq!(prod.task().unwrap().cpu, Some(1024));
    }

    #[test]
    fn test_apply_env_without_entry_strips_environments() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        let staging = manifest.apply_env("staging").unwrap();
        assert!(staging.environments().is_empty());
        assert_eq!(staging.aliases(), manifest.aliases());
        assert_eq!(staging.task(), manifest.task());
    }

    #[test]
    fn test_apply_env_is_idempotent() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        let overlay = manifest.env_override("test").unwrap().unwrap();
        assert!(overlay.as_mapping().is_some_and(|m| !m.is_empty()));

        let once = manifest.apply_env("test").unwrap();
        let twice = once.with_override("test", &overlay).unwrap();
        assert_eq!(once, twice);
        assert_ne!(once, manifest.with_override("test", &Value::Null).unwrap());
    }

    #[test]
    fn test_env_override_missing_env() {
        let manifest = WorkloadManifest::from_yaml(LB_MANIFEST).unwrap();
        assert_eq!(manifest.env_override("staging").unwrap(), None);
    }

    #[test]
    fn test_apply_env_rejects_scalar_override() {
        let raw = "name: api\ntype: Backend Service\nimage:\n  location: nginx\nenvironments:\n  test: 3\n";
        let manifest = WorkloadManifest::from_yaml(raw).unwrap();
        let err = manifest.apply_env("test").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidOverride { ref env } if env == "test"));
    }

    #[test]
    fn test_worker_capabilities() {
        let raw = r#"
name: processor
type: Worker Service
image:
  location: example/processor:latest
subscribe:
  topics:
    - name: created
      service: orders
      queue: true
"#;
        let manifest = WorkloadManifest::from_yaml(raw).unwrap();
        assert_eq!(manifest.kind(), WorkloadKind::WorkerService);
        assert!(!manifest.requires_build());
        assert_eq!(manifest.subscriptions().len(), 1);
        assert!(manifest.aliases().is_empty());
    }

    #[test]
    fn test_request_driven_alias() {
        let raw = r#"
name: web
type: Request-Driven Web Service
image:
  location: example/web:latest
  port: 8080
cpu: 1024
memory: 2048
http:
  alias: web.example.com
"#;
        let manifest = WorkloadManifest::from_yaml(raw).unwrap();
        assert_eq!(manifest.aliases(), vec!["web.example.com"]);
        assert!(manifest.task().is_none());
        assert!(manifest.publish_topics().is_empty());
        match manifest {
            WorkloadManifest::RequestDrivenWebService(rdws) => assert_eq!(rdws.instance.cpu, Some(1024)),
            other => panic!("unexpected variant {:?}", other.kind()),
        }
    }

    #[test]
    fn test_scheduled_job_schedule() {
        let raw = "name: report\ntype: Scheduled Job\nimage:\n  build: ./Dockerfile\non:\n  schedule: \"@daily\"\ntimeout: 1h\n";
        let manifest = WorkloadManifest::from_yaml(raw).unwrap();
        assert_eq!(manifest.schedule(), Some("@daily"));
        assert!(manifest.kind().is_job());
    }
}
